//! End-to-end geometry scenarios over a small image → conv → pool → dense
//! chain.

use convgeom::{
    ConvParams, DenseParams, ImageParams, LayerTopology, RenderSettings, Scene,
};
use glam::IVec2;

fn image_4x4(scene: &mut Scene) -> convgeom::LayerId {
    scene
        .add_image(
            ImageParams {
                reduced_resolution: IVec2::splat(4),
                rgb: false,
                ..ImageParams::default()
            },
            1,
        )
        .unwrap()
}

#[test]
fn padded_conv_keeps_resolution() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(1, LayerTopology::default(), ConvParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();

    // 3x3, stride 1, padded: floor((4-3+2)/1)+1 = 4
    assert_eq!(
        scene.layer(conv).unwrap().output_resolution_2d(),
        IVec2::splat(4)
    );

    let image_map = &scene.layer(image).unwrap().feature_maps()[0];
    let props = image_map.output_properties(conv).unwrap();
    assert_eq!(props.filter_instance_grid.vertex_count(), 16);

    let collapsed = image_map.filter_grids(conv, 0.0).unwrap();
    assert_eq!(collapsed.len(), 1);
    assert_eq!(collapsed[0].vertex_count(), 9);

    let expanded = image_map.filter_grids(conv, 1.0).unwrap();
    assert_eq!(expanded.len(), 16);
}

#[test]
fn unpadded_conv_shrinks_resolution() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(
            1,
            LayerTopology {
                padding: false,
                ..LayerTopology::default()
            },
            ConvParams::default(),
        )
        .unwrap();
    scene.connect(image, conv).unwrap();

    // 3x3, stride 1, no padding: floor((4-3)/1)+1 = 2
    assert_eq!(
        scene.layer(conv).unwrap().output_resolution_2d(),
        IVec2::splat(2)
    );

    let image_map = &scene.layer(image).unwrap().feature_maps()[0];
    let props = image_map.output_properties(conv).unwrap();
    assert_eq!(props.filter_instance_grid.vertex_count(), 4);
    assert_eq!(props.all_calc_filter_grids.len(), 4);
}

#[test]
fn collapsed_conv_mesh_draws_one_fan_per_input_map() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(1, LayerTopology::default(), ConvParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();

    // defaults: edge_bundle = 0, all_calculations = 0, so a single canonical
    // 3x3 footprint per input map, 9 line segments total
    let mesh = scene
        .mesh(conv, None, &RenderSettings::default())
        .unwrap();
    assert_eq!(mesh.line_count(), 9);
    // 16 output pixels rendered as points
    assert_eq!(mesh.point_count(), 16);
}

#[test]
fn fully_expanded_conv_mesh_draws_every_placement() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(1, LayerTopology::default(), ConvParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();

    scene.set_expansion_level(conv, 3.0).unwrap();

    // 16 receptive-field placements x 9 filter cells
    let mesh = scene
        .mesh(conv, None, &RenderSettings::default())
        .unwrap();
    assert_eq!(mesh.line_count(), 16 * 9);
}

#[test]
fn bundled_conv_routes_lines_through_waypoints() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(1, LayerTopology::default(), ConvParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();

    scene.set_expansion_level(conv, 0.5).unwrap();

    // edge_bundle = 0.5 doubles each connection into two segments
    let mesh = scene
        .mesh(conv, None, &RenderSettings::default())
        .unwrap();
    assert_eq!(mesh.line_count(), 18);
}

#[test]
fn fully_bundled_dense_layer_draws_one_line_per_input_point() {
    let mut scene = Scene::new();
    let front = scene
        .add_fully_connected(5, 5, DenseParams::default())
        .unwrap();
    let back = scene
        .add_fully_connected(3, 10, DenseParams::default())
        .unwrap();
    scene.connect(front, back).unwrap();

    // level 0: edge_bundle = 1, the bundle fast path
    scene.set_expansion_level(back, 0.0).unwrap();

    let mesh = scene.mesh(back, None, &RenderSettings::default()).unwrap();
    // the input exposes 5 points; the fast path emits exactly one segment
    // per input point rather than 5 x reduced_depth
    assert_eq!(mesh.line_count(), 5);
    assert_eq!(mesh.point_count(), 3);
}

#[test]
fn unbundled_dense_layer_is_quadratic() {
    let mut scene = Scene::new();
    let front = scene
        .add_fully_connected(5, 5, DenseParams::default())
        .unwrap();
    let back = scene
        .add_fully_connected(3, 10, DenseParams::default())
        .unwrap();
    scene.connect(front, back).unwrap();

    scene.set_expansion_level(back, 3.0).unwrap();

    let mesh = scene.mesh(back, None, &RenderSettings::default()).unwrap();
    assert_eq!(mesh.line_count(), 3 * 5);
}

#[test]
fn refresh_without_changes_is_idempotent() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(2, LayerTopology::default(), ConvParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();

    scene.update(image).unwrap();
    let first = scene
        .mesh(conv, None, &RenderSettings::default())
        .unwrap();

    scene.update(image).unwrap();
    let second = scene
        .mesh(conv, None, &RenderSettings::default())
        .unwrap();

    assert_eq!(first.vertices, second.vertices);
    assert_eq!(first.line_indices, second.line_indices);
    assert_eq!(first.point_indices, second.point_indices);
}

#[test]
fn full_chain_stays_consistent_through_edits() {
    let mut scene = Scene::new();
    let image = image_4x4(&mut scene);
    let conv = scene
        .add_conv(2, LayerTopology::default(), ConvParams::default())
        .unwrap();
    let pool = scene
        .add_max_pool(LayerTopology {
            conv_shape: IVec2::splat(2),
            stride: IVec2::splat(2),
            padding: false,
            ..LayerTopology::default()
        })
        .unwrap();
    let dense = scene
        .add_fully_connected(4, 16, DenseParams::default())
        .unwrap();
    scene.connect(image, conv).unwrap();
    scene.connect(conv, pool).unwrap();
    scene.connect(pool, dense).unwrap();

    assert_eq!(
        scene.layer(pool).unwrap().output_resolution_2d(),
        IVec2::splat(2)
    );

    // widen the input; every downstream resolution follows
    scene
        .set_image_params(
            image,
            ImageParams {
                reduced_resolution: IVec2::splat(8),
                rgb: false,
                ..ImageParams::default()
            },
        )
        .unwrap();

    assert_eq!(
        scene.layer(conv).unwrap().output_resolution_2d(),
        IVec2::splat(8)
    );
    assert_eq!(
        scene.layer(pool).unwrap().output_resolution_2d(),
        IVec2::splat(4)
    );

    // every layer still produces coherent buffers
    for (_, mesh) in scene.meshes(None, &RenderSettings::default()).unwrap() {
        assert_eq!(mesh.vertices.len(), mesh.colors.len());
        for &index in mesh
            .point_indices
            .iter()
            .chain(&mesh.line_indices)
            .chain(&mesh.triangle_indices)
        {
            assert!((index as usize) < mesh.vertices.len());
        }
    }
}
