//! Synthetic test pattern for checking the wiring against the mapper.
//!
//! A dim horizontal gradient shows whether left and right are the right way
//! round; a single white "chaser" LED walks the strip in physical order, so a
//! wrong wiring mode or origin shows up as a dot jumping around instead of
//! sweeping row by row (or column by column).

use crate::Color;
use crate::mapping::Layout;
use image::RgbImage;
use std::time::Duration;

/// Default pause between chaser steps.
pub const DEFAULT_CHASER_DELAY: Duration = Duration::from_millis(2);

/// Gradient color for column `x` of a grid `width` cells wide. Independent of y.
pub fn gradient_color(x: u32, width: u32) -> Color {
    let span = width.saturating_sub(1).max(1);
    let value = (255 * u64::from(x.min(span)) / u64::from(span)) as u8;
    Color::new(value / 3, value, value / 2)
}

/// Grid filled with the horizontal gradient.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| gradient_color(x, width).into())
}

/// A single lit LED stepping through the strip in physical order.
#[derive(Debug, Clone)]
pub struct Chaser {
    index: usize,
    delay: Duration,
}

impl Chaser {
    pub fn new(delay: Duration) -> Self {
        Self { index: 0, delay }
    }

    /// Physical index lit by the next [`Chaser::render`].
    pub fn index(&self) -> usize {
        self.index
    }

    /// How long to pause after each step so a human can follow the dot.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Draw the gradient with the chaser LED white, then advance one LED.
    pub fn render(&mut self, layout: &Layout) -> RgbImage {
        let mut grid = gradient(layout.width(), layout.height());
        // The layout may have shrunk or been re-wired since the last step.
        self.index %= layout.led_count();
        if let Some((x, y)) = layout.position_of(self.index) {
            grid.put_pixel(x, y, Color::WHITE.into());
        }
        self.index = (self.index + 1) % layout.led_count();
        grid
    }
}

impl Default for Chaser {
    fn default() -> Self {
        Self::new(DEFAULT_CHASER_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::WiringMode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn white_cells(grid: &RgbImage) -> Vec<(u32, u32)> {
        grid.enumerate_pixels()
            .filter(|(_, _, p)| Color::from(**p) == Color::WHITE)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[rstest]
    #[case(0, 4, Color::new(0, 0, 0))]
    #[case(3, 4, Color::new(85, 255, 127))]
    #[case(1, 3, Color::new(42, 127, 63))]
    fn gradient_color_spans_full_range(#[case] x: u32, #[case] width: u32, #[case] expected: Color) {
        assert_eq!(gradient_color(x, width), expected);
    }

    #[test]
    fn single_column_gradient_is_black() {
        assert_eq!(gradient_color(0, 1), Color::BLACK);
    }

    #[test]
    fn gradient_ignores_y() {
        let grid = gradient(5, 3);
        for x in 0..5 {
            assert_eq!(grid.get_pixel(x, 0), grid.get_pixel(x, 2));
        }
    }

    #[test]
    fn chaser_follows_physical_order() {
        let layout = Layout::new(3, 2, WiringMode::RowsSnake, true).unwrap();
        let mut chaser = Chaser::default();

        let lit: Vec<Vec<(u32, u32)>> = (0..6).map(|_| white_cells(&chaser.render(&layout))).collect();

        assert_eq!(
            lit,
            vec![
                vec![(0, 0)],
                vec![(1, 0)],
                vec![(2, 0)],
                vec![(2, 1)],
                vec![(1, 1)],
                vec![(0, 1)],
            ]
        );
    }

    #[test]
    fn chaser_wraps_at_end_of_strip() {
        let layout = Layout::new(2, 2, WiringMode::ColsSnake, true).unwrap();
        let mut chaser = Chaser::default();
        for _ in 0..4 {
            chaser.render(&layout);
        }
        assert_eq!(chaser.index(), 0);
        assert_eq!(white_cells(&chaser.render(&layout)), vec![(0, 0)]);
    }

    #[test]
    fn chaser_respects_current_wiring() {
        let layout = Layout::new(3, 2, WiringMode::ColsSnake, true).unwrap();
        let mut chaser = Chaser::default();
        chaser.render(&layout);
        // Second LED on a column-wired strip sits below the first.
        assert_eq!(white_cells(&chaser.render(&layout)), vec![(0, 1)]);
    }

    #[test]
    fn chaser_index_is_clamped_after_layout_shrinks() {
        let big = Layout::new(4, 4, WiringMode::RowsSnake, true).unwrap();
        let small = Layout::new(2, 2, WiringMode::RowsSnake, true).unwrap();
        let mut chaser = Chaser::default();
        for _ in 0..6 {
            chaser.render(&big);
        }
        let grid = chaser.render(&small);
        assert_eq!(white_cells(&grid).len(), 1);
        assert!(chaser.index() < small.led_count());
    }
}
