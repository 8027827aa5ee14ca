//! chain2mesh: build a CNN layer chain from a JSON descriptor and emit the
//! computed mesh buffers (vertices, colors, point/line/triangle indices) per
//! layer as JSON.
//!
//! Descriptor format: `layers` in input-to-output order, each connected to
//! its predecessor:
//!
//! ```json
//! {
//!   "layers": [
//!     { "kind": "image", "reduced_resolution": [11, 11], "depth": 3 },
//!     { "kind": "conv", "filters": 64, "reduced_depth": 4,
//!       "conv_shape": [3, 3], "stride": [1, 1], "padding": true,
//!       "expansion": 1.5 },
//!     { "kind": "max_pool", "pool_shape": [2, 2], "stride": [2, 2] },
//!     { "kind": "fully_connected", "neurons": 256, "reduced_depth": 16 }
//!   ]
//! }
//! ```
//!
//! Layout sliders (`spread`, `spacing`, `line_circle_grid`, `line_x_to_z`)
//! and `z_offset` may be set on any layer; `expansion` drives the layer's
//! expansion-level state machine.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use convgeom::{
    ConvParams, DenseParams, ImageParams, LayerId, LayerTopology, LayoutParams, MeshBuffers,
    RenderSettings, Scene,
};
use glam::IVec2;

#[derive(Parser, Debug)]
#[command(name = "chain2mesh", version)]
struct Args {
    /// Path to the chain descriptor JSON.
    #[arg(long, default_value = "chain.json")]
    chain: PathBuf,

    /// Output path for the mesh JSON; "-" writes to stdout.
    #[arg(long, default_value = "-")]
    output: String,

    /// Override the expansion level of every input-accepting layer.
    #[arg(long)]
    expansion: Option<f32>,

    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Log per-layer statistics only; write no mesh JSON.
    #[arg(long, default_value_t = false)]
    stats_only: bool,
}

/// Optional per-layer slider overrides, applied after construction.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct SliderDoc {
    spread: Option<f32>,
    spacing: Option<f32>,
    line_circle_grid: Option<f32>,
    line_x_to_z: Option<f32>,
    z_offset: Option<f32>,
    expansion: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LayerDoc {
    Image {
        reduced_resolution: [i32; 2],
        #[serde(default = "default_full_resolution")]
        full_resolution: [i32; 2],
        #[serde(default = "default_image_depth")]
        depth: usize,
        #[serde(default)]
        rgb: Option<bool>,
        #[serde(default)]
        show_full_resolution: bool,
        #[serde(flatten)]
        sliders: SliderDoc,
    },
    Conv {
        filters: usize,
        #[serde(default = "default_reduced_depth")]
        reduced_depth: usize,
        #[serde(default = "default_conv_shape")]
        conv_shape: [i32; 2],
        #[serde(default = "default_one")]
        stride: [i32; 2],
        #[serde(default = "default_one")]
        dilation: [i32; 2],
        #[serde(default = "default_true")]
        padding: bool,
        #[serde(default)]
        show_original_depth: bool,
        #[serde(flatten)]
        sliders: SliderDoc,
    },
    MaxPool {
        #[serde(default = "default_pool_shape")]
        pool_shape: [i32; 2],
        #[serde(default = "default_pool_stride")]
        stride: [i32; 2],
        #[serde(default)]
        padding: bool,
        #[serde(flatten)]
        sliders: SliderDoc,
    },
    FullyConnected {
        neurons: usize,
        #[serde(default = "default_reduced_depth")]
        reduced_depth: usize,
        #[serde(default)]
        collapse_input: Option<f32>,
        #[serde(flatten)]
        sliders: SliderDoc,
    },
}

fn default_full_resolution() -> [i32; 2] {
    [224, 224]
}
fn default_image_depth() -> usize {
    3
}
fn default_reduced_depth() -> usize {
    4
}
fn default_conv_shape() -> [i32; 2] {
    [3, 3]
}
fn default_one() -> [i32; 2] {
    [1, 1]
}
fn default_pool_shape() -> [i32; 2] {
    [2, 2]
}
fn default_pool_stride() -> [i32; 2] {
    [2, 2]
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ChainDoc {
    layers: Vec<LayerDoc>,
}

#[derive(Debug, Serialize)]
struct MeshDoc {
    layer: String,
    kind: String,
    resolution: [i32; 2],
    reduced_depth: usize,
    z: f32,
    vertices: Vec<[f32; 3]>,
    colors: Vec<[f32; 4]>,
    point_indices: Vec<u32>,
    line_indices: Vec<u32>,
    triangle_indices: Vec<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.chain)
        .with_context(|| format!("reading chain descriptor {}", args.chain.display()))?;
    let doc: ChainDoc = serde_json::from_str(&text)
        .with_context(|| format!("parsing chain descriptor {}", args.chain.display()))?;

    if doc.layers.is_empty() {
        bail!("chain descriptor contains no layers");
    }

    let scene = build_scene(&doc, args.expansion)?;

    let meshes = scene
        .meshes(None, &RenderSettings::default())
        .context("computing mesh buffers")?;

    let mut docs = Vec::with_capacity(meshes.len());
    for (id, mesh) in &meshes {
        let layer = scene.layer(*id).context("resolving layer")?;
        info!(
            "{} {}: {}x{} x{} | {} points, {} lines, {} triangles",
            id,
            layer.kind().name(),
            layer.output_resolution_2d().x,
            layer.output_resolution_2d().y,
            layer.reduced_depth(),
            mesh.point_count(),
            mesh.line_count(),
            mesh.triangle_count(),
        );
        docs.push(mesh_doc(*id, &scene, mesh)?);
    }

    if args.stats_only {
        return Ok(());
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&docs)?
    } else {
        serde_json::to_string(&docs)?
    };

    if args.output == "-" {
        println!("{json}");
    } else {
        fs::write(&args.output, json)
            .with_context(|| format!("writing mesh output {}", args.output))?;
        info!("wrote {} layer meshes to {}", docs.len(), args.output);
    }

    Ok(())
}

fn build_scene(doc: &ChainDoc, expansion_override: Option<f32>) -> Result<Scene> {
    let mut scene = Scene::new();
    let mut previous: Option<LayerId> = None;

    for (position, layer_doc) in doc.layers.iter().enumerate() {
        let (id, sliders) = add_layer(&mut scene, layer_doc)
            .with_context(|| format!("building layer {position}"))?;

        if let Some(input) = previous {
            scene
                .connect(input, id)
                .with_context(|| format!("connecting layer {position} to its input"))?;
        }

        apply_sliders(&mut scene, id, &sliders)?;
        if let Some(level) = expansion_override.or(sliders.expansion) {
            scene
                .set_expansion_level(id, level)
                .with_context(|| format!("setting expansion level on layer {position}"))?;
        }

        previous = Some(id);
    }

    Ok(scene)
}

fn add_layer(scene: &mut Scene, doc: &LayerDoc) -> Result<(LayerId, SliderDoc)> {
    let (id, sliders) = match doc {
        LayerDoc::Image {
            reduced_resolution,
            full_resolution,
            depth,
            rgb,
            show_full_resolution,
            sliders,
        } => {
            let params = ImageParams {
                full_resolution: IVec2::from_array(*full_resolution),
                reduced_resolution: IVec2::from_array(*reduced_resolution),
                show_full_resolution: *show_full_resolution,
                rgb: rgb.unwrap_or(*depth == 3),
                ..ImageParams::default()
            };
            (scene.add_image(params, *depth)?, *sliders)
        }
        LayerDoc::Conv {
            filters,
            reduced_depth,
            conv_shape,
            stride,
            dilation,
            padding,
            show_original_depth,
            sliders,
        } => {
            let topology = LayerTopology {
                conv_shape: IVec2::from_array(*conv_shape),
                stride: IVec2::from_array(*stride),
                dilation: IVec2::from_array(*dilation),
                padding: *padding,
                depth: *filters,
            };
            let params = ConvParams {
                show_original_depth: *show_original_depth,
                ..ConvParams::default()
            };
            (scene.add_conv(*reduced_depth, topology, params)?, *sliders)
        }
        LayerDoc::MaxPool {
            pool_shape,
            stride,
            padding,
            sliders,
        } => {
            let topology = LayerTopology {
                conv_shape: IVec2::from_array(*pool_shape),
                stride: IVec2::from_array(*stride),
                padding: *padding,
                ..LayerTopology::default()
            };
            (scene.add_max_pool(topology)?, *sliders)
        }
        LayerDoc::FullyConnected {
            neurons,
            reduced_depth,
            collapse_input,
            sliders,
        } => {
            let params = DenseParams {
                collapse_input: collapse_input.unwrap_or(0.0),
                ..DenseParams::default()
            };
            (
                scene.add_fully_connected(*reduced_depth, *neurons, params)?,
                *sliders,
            )
        }
    };
    Ok((id, sliders))
}

fn apply_sliders(scene: &mut Scene, id: LayerId, sliders: &SliderDoc) -> Result<()> {
    let current = *scene.layer(id)?.layout();
    let layout = LayoutParams {
        spread: sliders.spread.unwrap_or(current.spread),
        spacing: sliders.spacing.unwrap_or(current.spacing),
        line_circle_grid: sliders.line_circle_grid.unwrap_or(current.line_circle_grid),
        line_x_to_z: sliders.line_x_to_z.unwrap_or(current.line_x_to_z),
    };
    if layout != current {
        scene.set_layout(id, layout)?;
    }
    if let Some(z_offset) = sliders.z_offset {
        scene.set_z_offset(id, z_offset)?;
    }
    Ok(())
}

fn mesh_doc(id: LayerId, scene: &Scene, mesh: &MeshBuffers) -> Result<MeshDoc> {
    let layer = scene.layer(id)?;
    Ok(MeshDoc {
        layer: id.to_string(),
        kind: layer.kind().name().to_string(),
        resolution: layer.output_resolution_2d().to_array(),
        reduced_depth: layer.reduced_depth(),
        z: layer.z_position(),
        vertices: mesh.vertices.iter().map(|v| v.to_array()).collect(),
        colors: mesh.colors.clone(),
        point_indices: mesh.point_indices.clone(),
        line_indices: mesh.line_indices.clone(),
        triangle_indices: mesh.triangle_indices.clone(),
    })
}
