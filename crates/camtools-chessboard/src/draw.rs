//! Overlay rendering for detected chessboard corners.

use camtools_core::RgbImage;
use nalgebra::Point2;

const MARKER_RADIUS: i32 = 4;

/// Row colours cycled along the pattern.
const ROW_COLORS: [[u8; 3]; 7] = [
    [255, 0, 0],
    [255, 128, 0],
    [200, 200, 0],
    [0, 255, 0],
    [0, 200, 200],
    [0, 0, 255],
    [255, 0, 255],
];

const NOT_FOUND_COLOR: [u8; 3] = [255, 0, 0];

fn draw_line(img: &mut RgbImage, a: (i32, i32), b: (i32, i32), color: [u8; 3]) {
    let (mut x0, mut y0) = a;
    let (x1, y1) = b;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        img.put(x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(img: &mut RgbImage, c: (i32, i32), r: i32, color: [u8; 3]) {
    let (cx, cy) = c;
    let mut x = r;
    let mut y = 0;
    let mut err = 1 - r;
    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            img.put(cx + px, cy + py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

fn to_pixel(p: &Point2<f32>) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Draw detected corners onto `img`.
///
/// With `found == true`, `points` is the complete row-major pattern of
/// `cols × rows` corners: each corner gets a circle and a cross in its row
/// colour and consecutive corners are joined by a polyline. Otherwise every
/// point is drawn as a red marker without connections.
pub fn draw_chessboard_corners(
    img: &mut RgbImage,
    cols: u32,
    rows: u32,
    points: &[Point2<f32>],
    found: bool,
) {
    let complete = found && cols > 0 && points.len() == (cols * rows) as usize;
    let r = MARKER_RADIUS;

    let mut prev: Option<(i32, i32)> = None;
    for (k, p) in points.iter().enumerate() {
        let c = to_pixel(p);
        let color = if complete {
            ROW_COLORS[(k / cols as usize) % ROW_COLORS.len()]
        } else {
            NOT_FOUND_COLOR
        };

        draw_line(img, (c.0 - r, c.1 - r), (c.0 + r, c.1 + r), color);
        draw_line(img, (c.0 - r, c.1 + r), (c.0 + r, c.1 - r), color);
        draw_circle(img, c, r, color);

        if complete {
            if let Some(pc) = prev {
                draw_line(img, pc, c, color);
            }
            prev = Some(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(img: &RgbImage, x: usize, y: usize) -> [u8; 3] {
        let i = (y * img.width + x) * 3;
        [img.data[i], img.data[i + 1], img.data[i + 2]]
    }

    #[test]
    fn found_pattern_is_connected() {
        let mut img = RgbImage::new(100, 60);
        let pts: Vec<Point2<f32>> = (0..2)
            .flat_map(|j| (0..3).map(move |i| Point2::new(20.0 + 30.0 * i as f32, 20.0 + 20.0 * j as f32)))
            .collect();
        draw_chessboard_corners(&mut img, 3, 2, &pts, true);

        // Midpoint between the first two corners lies on the polyline.
        assert_eq!(pixel(&img, 35, 20), ROW_COLORS[0]);
        // Second row uses the next colour.
        assert_eq!(pixel(&img, 20 + MARKER_RADIUS as usize, 40), ROW_COLORS[1]);
    }

    #[test]
    fn not_found_draws_unconnected_red_markers() {
        let mut img = RgbImage::new(100, 60);
        let pts = vec![Point2::new(20.0_f32, 20.0), Point2::new(70.0, 20.0)];
        draw_chessboard_corners(&mut img, 3, 2, &pts, false);
        assert_eq!(pixel(&img, 20, 20), NOT_FOUND_COLOR);
        assert_eq!(pixel(&img, 45, 20), [0, 0, 0]);
    }

    #[test]
    fn markers_near_border_are_clipped() {
        let mut img = RgbImage::new(10, 10);
        draw_chessboard_corners(&mut img, 1, 1, &[Point2::new(0.0, 0.0)], true);
        assert_eq!(pixel(&img, 0, 0), ROW_COLORS[0]);
    }
}
