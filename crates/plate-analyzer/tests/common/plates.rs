//! Synthetic approach plates drawn in page units on a 600x800 page.
//!
//! Layout of [`rnav_plate`], top to bottom, boxes 5 units apart:
//!
//! ```text
//! +-------------------------------------------+  10
//! | RNAV (GPS) RWY 15                         |  briefing strip
//! | SEATTLE-TACOMA INTL (SEA)                 |
//! | APP CRS 153°   TDZE 1007   Apt Elev 1010  |
//! +-------------------------------------------+  70
//! | ATIS 127.65        TWR 119.1              |  comm box 75-105
//! +-------------------------------------------+
//! |                 LIMBE (IAF)               |  plan view 110-480
//! +-------------------------------------------+
//! |   GS 3.00°  TCH 55   \  MAP               |  profile view 485-600
//! +-------------------------------------------+
//! | CATEGORY |  A   |  B   |  C   |  D        |  minimums table 605-645
//! | LPV DA   | ...  | ...  | ...  | ...       |
//! +-------------------------------------------+
//! | T  Procedure NA at night. DME required.   |  notes 705-790
//! +-------------------------------------------+
//! ```

use plate_analyzer::{CollaboratorError, TextCollaborator};
use plate_core::{BBox, LinePrimitive, Page, PageId, RectPrimitive, TextToken};
use std::thread;
use std::time::Duration;

pub const PAGE_WIDTH: f64 = 600.0;
pub const PAGE_HEIGHT: f64 = 800.0;

/// Minimums table column dividers (label column, then categories A-D)
const TABLE_COLUMNS: [f64; 6] = [10.0, 130.0, 245.0, 360.0, 475.0, 590.0];
const TABLE_ROWS: [f64; 3] = [605.0, 625.0, 645.0];

fn token(text: &str, l: f64, t: f64, r: f64, b: f64) -> TextToken {
    TextToken::new(text, BBox::new(l, t, r, b))
}

fn boxed(page: Page, t: f64, b: f64) -> Page {
    page.with_rect(RectPrimitive::stroked(BBox::new(10.0, t, 590.0, b)))
}

/// Full RNAV plate with every zone kind
pub fn rnav_plate(id: &str) -> Page {
    let mut page = Page::new(id, PAGE_WIDTH, PAGE_HEIGHT);
    for (t, b) in [(10.0, 70.0), (75.0, 105.0), (110.0, 480.0), (485.0, 600.0), (705.0, 790.0)] {
        page = boxed(page, t, b);
    }

    // Minimums table, ruled cell by cell
    for y in TABLE_ROWS {
        page = page.with_line(LinePrimitive::from_coords(10.0, y, 590.0, y));
    }
    for x in TABLE_COLUMNS {
        page = page.with_line(LinePrimitive::from_coords(x, 605.0, x, 645.0));
    }

    // Descent path in the profile view
    page = page.with_line(LinePrimitive::from_coords(60.0, 500.0, 400.0, 580.0));

    page = page
        .with_token(token("RNAV (GPS) RWY 15", 220.0, 14.0, 380.0, 24.0))
        .with_token(token("SEATTLE-TACOMA INTL (SEA)", 225.0, 26.0, 375.0, 36.0))
        .with_token(token("APP CRS 153°", 20.0, 40.0, 90.0, 50.0))
        .with_token(token("TDZE 1007", 220.0, 40.0, 280.0, 50.0))
        .with_token(token("Apt Elev 1010", 420.0, 40.0, 500.0, 50.0))
        .with_token(token("ATIS", 20.0, 84.0, 45.0, 94.0))
        .with_token(token("127.65", 50.0, 84.0, 85.0, 94.0))
        .with_token(token("TWR", 200.0, 84.0, 225.0, 94.0))
        .with_token(token("119.1", 230.0, 84.0, 260.0, 94.0))
        .with_token(token("LIMBE", 280.0, 280.0, 310.0, 290.0))
        .with_token(token("(IAF)", 280.0, 292.0, 305.0, 300.0))
        .with_token(token("GS 3.00°", 80.0, 540.0, 125.0, 550.0))
        .with_token(token("TCH 55", 140.0, 540.0, 175.0, 550.0))
        .with_token(token("MAP", 390.0, 582.0, 410.0, 590.0))
        .with_token(token("CATEGORY", 15.0, 610.0, 70.0, 620.0))
        .with_token(token("LPV DA", 15.0, 630.0, 55.0, 640.0));
    for (i, category) in ["A", "B", "C", "D"].into_iter().enumerate() {
        let l = TABLE_COLUMNS[i + 1] + 5.0;
        page = page
            .with_token(token(category, l + 40.0, 610.0, l + 46.0, 620.0))
            .with_token(token("1212-1", l, 630.0, l + 30.0, 640.0))
            .with_token(token("261", l + 35.0, 630.0, l + 50.0, 640.0));
    }
    page.with_token(token("T", 13.0, 712.0, 20.0, 722.0))
        .with_token(token("Procedure NA at night.", 30.0, 712.0, 150.0, 722.0))
        .with_token(token("DME required.", 30.0, 726.0, 100.0, 736.0))
}

/// `k` by `k` ruled grid of `size` cells, drawn with `k + 1` lines each way
pub fn grid_page(k: usize, size: f64) -> Page {
    let extent = size * k as f64;
    let mut page = Page::new(format!("grid-{k}"), PAGE_WIDTH, PAGE_HEIGHT);
    for i in 0..=k {
        let at = 10.0 + size * i as f64;
        page = page
            .with_line(LinePrimitive::from_coords(10.0, at, 10.0 + extent, at))
            .with_line(LinePrimitive::from_coords(at, 10.0, at, 10.0 + extent));
    }
    page
}

/// Three small ruled columns holding minimums cues
pub fn cue_table_page() -> Page {
    let mut page = Page::new("cue-table", PAGE_WIDTH, PAGE_HEIGHT);
    for y in [600.0, 625.0, 650.0] {
        page = page.with_line(LinePrimitive::from_coords(150.0, y, 450.0, y));
    }
    for x in [150.0, 250.0, 350.0, 450.0] {
        page = page.with_line(LinePrimitive::from_coords(x, 600.0, x, 650.0));
    }
    page.with_token(token("CAT A", 260.0, 607.0, 300.0, 617.0))
        .with_token(token("RVR", 360.0, 632.0, 390.0, 642.0))
}

/// Scanned page: text, no vector content
pub fn text_only_page(id: &str) -> Page {
    Page::new(id, PAGE_WIDTH, PAGE_HEIGHT)
        .with_token(token("ATIS", 20.0, 84.0, 45.0, 94.0))
        .with_token(token("127.65", 50.0, 84.0, 85.0, 94.0))
        .with_token(token("Procedure NA at night.", 30.0, 712.0, 150.0, 722.0))
}

/// Collaborator that takes longer than any sensible timeout
#[derive(Debug, Clone, Copy)]
pub struct SlowOcr(pub Duration);

impl TextCollaborator for SlowOcr {
    fn recognize(
        &self,
        _page: &PageId,
        _region: BBox,
        _timeout: Duration,
    ) -> Result<Vec<TextToken>, CollaboratorError> {
        thread::sleep(self.0);
        Ok(Vec::new())
    }
}
