//! Integration tests for the SOM configuration document
//!
//! These tests verify that:
//! - The rendered document matches the golden file byte for byte
//! - Locale decimals are normalized before serialization
//! - Writing then reading yields the same configuration for any parameters

use proptest::prelude::*;
use somflow_core::models::{
    ClusterCounts, Cooling, DecimalText, GridShape, Initialization, MapTopology,
    NeighborhoodFunction, SomConfiguration, SomParameters, WorkspaceLayout,
};
use somflow_core::som_xml::{read_configuration, render_configuration, write_configuration};
use tempfile::TempDir;

fn scenario_parameters() -> SomParameters {
    SomParameters {
        grid_width: 10,
        grid_height: 8,
        epochs: 1000,
        topology: MapTopology::Planar,
        grid_shape: GridShape::Rectangular,
        neighborhood: NeighborhoodFunction::Gaussian,
        neighborhood_coeff: DecimalText::parse("0,5").unwrap(),
        initialization: Initialization::Random,
        radius_initial: 0,
        radius_final: 1,
        radius_cooling: Cooling::Linear,
        rate_initial: DecimalText::parse("0,1").unwrap(),
        rate_final: DecimalText::parse("0,01").unwrap(),
        rate_cooling: Cooling::Linear,
        clusters: ClusterCounts { initial: 5, min: 2, max: 25 },
    }
}

#[cfg(unix)]
#[test]
fn test_matches_golden_document() {
    let layout = WorkspaceLayout::at("/work/som");
    let cfg = SomConfiguration::for_layout(&layout, scenario_parameters());

    let rendered = render_configuration(&cfg).unwrap();
    let golden = include_str!("fixtures/som_golden.xml");

    assert_eq!(rendered, golden);
}

#[test]
fn test_scenario_grid_and_coefficient() {
    let temp = TempDir::new().unwrap();
    let layout = WorkspaceLayout::at(temp.path());
    let cfg = SomConfiguration::for_layout(&layout, scenario_parameters());

    let path = write_configuration(&cfg, &layout.config_document()).unwrap();
    assert_eq!(path, temp.path().join("SOM.xml"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("<std_coeff>0.5</std_coeff>"));
    assert!(content.contains("<som_x>10</som_x>"));
    assert!(content.contains("<som_y>8</som_y>"));
    assert!(content.contains("<nEpoch>1000</nEpoch>"));

    let read_back = read_configuration(&path).unwrap();
    assert_eq!(read_back, cfg);
}

#[test]
fn test_paths_with_markup_characters() {
    let layout = WorkspaceLayout::at("/data/R&D <som>");
    let cfg = SomConfiguration::for_layout(&layout, scenario_parameters());

    let rendered = render_configuration(&cfg).unwrap();
    assert!(rendered.contains("R&amp;D &lt;som&gt;"));

    let parsed = somflow_core::som_xml::parse_configuration(&rendered).unwrap();
    assert_eq!(parsed.files.training_set, layout.training_set());
}

fn decimal_strategy() -> impl Strategy<Value = (String, String)> {
    (0u32..100, 1u32..10_000, prop::bool::ANY).prop_map(|(int, frac, comma)| {
        let sep = if comma { "," } else { "." };
        (format!("{}{}{}", int, sep, frac), format!("{}.{}", int, frac))
    })
}

fn cooling_strategy() -> impl Strategy<Value = Cooling> {
    prop_oneof![Just(Cooling::Linear), Just(Cooling::Exponential)]
}

prop_compose! {
    fn parameters_strategy()(
        grid_width in 1u32..200,
        grid_height in 1u32..200,
        epochs in 1u32..100_000,
        topology in prop_oneof![Just(MapTopology::Planar), Just(MapTopology::Toroid)],
        grid_shape in prop_oneof![Just(GridShape::Rectangular), Just(GridShape::Hexagonal)],
        neighborhood in prop_oneof![
            Just(NeighborhoodFunction::Gaussian),
            Just(NeighborhoodFunction::Bubble)
        ],
        coeff in decimal_strategy(),
        initialization in prop_oneof![Just(Initialization::Random), Just(Initialization::Pca)],
        radius_initial in 0u32..50,
        radius_final in 0u32..50,
        radius_cooling in cooling_strategy(),
        rate_initial in decimal_strategy(),
        rate_final in decimal_strategy(),
        rate_cooling in cooling_strategy(),
        min in 1u32..20,
        spread in 0u32..30,
        initial in 1u32..30,
    ) -> (SomParameters, [String; 3]) {
        let params = SomParameters {
            grid_width,
            grid_height,
            epochs,
            topology,
            grid_shape,
            neighborhood,
            neighborhood_coeff: DecimalText::parse(&coeff.0).unwrap(),
            initialization,
            radius_initial,
            radius_final,
            radius_cooling,
            rate_initial: DecimalText::parse(&rate_initial.0).unwrap(),
            rate_final: DecimalText::parse(&rate_final.0).unwrap(),
            rate_cooling,
            clusters: ClusterCounts { initial, min, max: min + spread },
        };
        (params, [coeff.1, rate_initial.1, rate_final.1])
    }
}

proptest! {
    #[test]
    fn prop_round_trip((params, normalized) in parameters_strategy()) {
        let layout = WorkspaceLayout::at("/work/som");
        let cfg = SomConfiguration::for_layout(&layout, params);

        let rendered = render_configuration(&cfg).unwrap();
        let parsed = somflow_core::som_xml::parse_configuration(&rendered).unwrap();

        prop_assert_eq!(&parsed, &cfg);
        prop_assert_eq!(parsed.parameters.neighborhood_coeff.as_str(), normalized[0].as_str());
        prop_assert_eq!(parsed.parameters.rate_initial.as_str(), normalized[1].as_str());
        prop_assert_eq!(parsed.parameters.rate_final.as_str(), normalized[2].as_str());
        prop_assert!(!rendered.contains(','));
    }

    #[test]
    fn prop_render_deterministic((params, _) in parameters_strategy()) {
        let layout = WorkspaceLayout::at("/work/som");
        let cfg = SomConfiguration::for_layout(&layout, params);
        prop_assert_eq!(render_configuration(&cfg).unwrap(), render_configuration(&cfg.clone()).unwrap());
    }
}
