//! Property tests over generated grids and token layouts.

mod common;

use common::{grid_page, PAGE_HEIGHT, PAGE_WIDTH};
use plate_analyzer::{PlateAnalyzer, PrimitiveExtractor, Segmenter, SegmenterConfig};
use plate_core::{AnalyzerConfig, BBox, TextToken};
use proptest::prelude::*;

const WORDS: [&str; 8] = [
    "CATEGORY", "ATIS", "127.65", "TDZE 1007", "LIMBE", "MAP", "1212-1", "required",
];

fn no_collapse() -> SegmenterConfig {
    SegmenterConfig {
        cell_collapse_area: 0.0,
        ..SegmenterConfig::default()
    }
}

fn tokens() -> impl Strategy<Value = Vec<TextToken>> {
    prop::collection::vec(
        (0..WORDS.len(), 0.0..PAGE_WIDTH - 60.0, 0.0..PAGE_HEIGHT - 12.0),
        0..24,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .map(|(word, l, t)| TextToken::new(WORDS[word], BBox::new(l, t, l + 50.0, t + 10.0)))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_complete_grid_has_k_squared_disjoint_zones(k in 1usize..=5, size in 25.0f64..100.0) {
        let page = grid_page(k, size);
        let primitives = PrimitiveExtractor::default().extract(&page);
        let segmentation = Segmenter::new(no_collapse()).segment(&page, &primitives).unwrap();

        prop_assert_eq!(segmentation.zones.len(), k * k);
        for (i, a) in segmentation.zones.iter().enumerate() {
            prop_assert!(a.boundary.is_fully_bounded());
            for b in &segmentation.zones[i + 1..] {
                prop_assert!(a.bbox.intersection_area(&b.bbox) < 1e-6);
            }
        }
    }

    #[test]
    fn prop_every_token_lands_in_one_zone(tokens in tokens()) {
        let mut page = grid_page(3, 90.0);
        for token in tokens {
            page = page.with_token(token);
        }
        let primitives = PrimitiveExtractor::default().extract(&page);
        let segmentation = Segmenter::new(no_collapse()).segment(&page, &primitives).unwrap();

        let mut owned: Vec<usize> = segmentation
            .all_zones()
            .flat_map(|z| z.token_ids.iter().map(|id| id.0))
            .collect();
        owned.sort_unstable();
        let expected: Vec<usize> = (0..page.tokens.len()).collect();
        prop_assert_eq!(owned, expected);
    }

    #[test]
    fn prop_analysis_is_idempotent(tokens in tokens(), k in 1usize..=4) {
        let mut page = grid_page(k, 120.0);
        for token in tokens {
            page = page.with_token(token);
        }
        let analyzer = PlateAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let first = analyzer.analyze(&page).unwrap();
        let second = analyzer.analyze(&page).unwrap();
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        prop_assert_eq!(first, second);
    }
}
