use assert_cmd::Command;
use nalgebra::{Matrix3, Rotation3, Vector3};
use predicates::prelude::*;
use std::path::Path;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FX: f64 = 520.0;
const FY: f64 = 520.0;
const CX: f64 = 320.0;
const CY: f64 = 240.0;

/// Board with 8x6 squares (7x5 inner corners) of unit size seen through an
/// ideal pinhole camera, centred at depth 14.
fn render_view(rvec: [f64; 3], path: &Path) {
    render_view_sized(rvec, WIDTH, HEIGHT, path);
}

/// [`render_view`] on a `width × height` sensor with the principal point at
/// its centre.
fn render_view_sized(rvec: [f64; 3], width: u32, height: u32, path: &Path) {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let k = Matrix3::new(FX, 0.0, cx, 0.0, FY, cy, 0.0, 0.0, 1.0);
    let rot = Rotation3::from_scaled_axis(Vector3::new(rvec[0], rvec[1], rvec[2]));
    let t = Vector3::new(0.0, 0.0, 14.0) - rot * Vector3::new(4.0, 3.0, 0.0);
    let r = rot.matrix();
    let h = k * Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t]);
    let h_inv = h.try_inverse().unwrap();

    let img = image::GrayImage::from_fn(width, height, |u, v| {
        let mut acc = 0.0_f64;
        for sy in 0..3 {
            for sx in 0..3 {
                let px = u as f64 + (sx as f64 - 1.0) / 3.0;
                let py = v as f64 + (sy as f64 - 1.0) / 3.0;
                let q = h_inv * Vector3::new(px, py, 1.0);
                let (x, y) = (q.x / q.z, q.y / q.z);
                let dark = (0.0..8.0).contains(&x)
                    && (0.0..6.0).contains(&y)
                    && (x.floor() as i64 + y.floor() as i64) % 2 == 0;
                acc += if dark { 25.0 } else { 230.0 };
            }
        }
        image::Luma([(acc / 9.0).round() as u8])
    });
    img.save(path).unwrap();
}

fn write_frame(path: &Path, square: Option<(u32, u32)>) {
    let img = image::RgbImage::from_fn(80, 60, |x, y| match square {
        Some((x0, y0)) if (x0..x0 + 15).contains(&x) && (y0..y0 + 15).contains(&y) => {
            image::Rgb([250, 250, 250])
        }
        _ => image::Rgb([60, 60, 60]),
    });
    img.save(path).unwrap();
}

fn traffic(dir: &Path) {
    for i in 0..6 {
        let square = (i == 4).then_some((30, 20));
        write_frame(&dir.join(format!("frame_{i:03}.png")), square);
    }
}

#[test]
fn calibration_help_lists_flags() {
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--in-mask"))
        .stdout(predicate::str::contains("--pattern"))
        .stdout(predicate::str::contains("--alpha"));
}

#[test]
fn calibration_rejects_bad_pattern() {
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .args(["--pattern", "seven"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pattern"));
}

#[test]
fn calibration_without_inputs_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mask = format!("{}/*.jpg", dir.path().display());
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .args(["--in-mask", &mask])
        .arg("--out-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no input images match"));
}

#[test]
fn calibration_needs_three_views() {
    let dir = tempfile::tempdir().unwrap();
    render_view([0.3, 0.0, 0.05], &dir.path().join("view0.png"));
    render_view([0.0, 0.35, -0.05], &dir.path().join("view1.png"));
    let out = dir.path().join("out");
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .args(["--in-mask", &format!("{}/view*.png", dir.path().display())])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Chessboard found in"))
        .stderr(predicate::str::contains("need at least 3 views, got 2"));
    assert!(out.join("view0_output.bmp").is_file());
    assert!(!out.join("calibration.json").exists());
}

#[test]
fn calibrates_rendered_views() {
    let dir = tempfile::tempdir().unwrap();
    let rvecs = [
        [0.3, 0.0, 0.05],
        [-0.3, 0.1, 0.0],
        [0.0, 0.35, -0.05],
        [0.1, -0.35, 0.1],
        [0.25, 0.25, 0.0],
    ];
    for (i, rvec) in rvecs.iter().enumerate() {
        render_view(*rvec, &dir.path().join(format!("view{i}.png")));
    }
    image::GrayImage::from_pixel(WIDTH, HEIGHT, image::Luma([200]))
        .save(dir.path().join("view9.png"))
        .unwrap();

    let out = dir.path().join("out");
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .args(["--in-mask", &format!("{}/view*.png", dir.path().display())])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Chessboard not found in"))
        .stderr(predicate::str::contains("Images passed chessboard detection: 5"))
        .stderr(predicate::str::contains("Mean reprojection error"))
        .stderr(predicate::str::contains("Elapsed time"));

    for i in 0..5 {
        assert!(out.join(format!("view{i}_output.bmp")).is_file());
    }
    assert!(!out.join("view9_output.bmp").exists());
    // Every input is undistorted, found or not.
    assert!(out.join("view9_undistort_output.bmp").is_file());
    let undistorted = image::open(out.join("view0_undistort_output.bmp")).unwrap();
    assert!(undistorted.width() > WIDTH / 2 && undistorted.width() <= WIDTH);

    let raw = std::fs::read_to_string(out.join("calibration.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let k = &json["camera_matrix"];
    let fx = k[0][0].as_f64().unwrap();
    let fy = k[1][1].as_f64().unwrap();
    let cx = k[0][2].as_f64().unwrap();
    let cy = k[1][2].as_f64().unwrap();
    assert!((fx - FX).abs() / FX < 0.03, "fx={fx}");
    assert!((fy - FY).abs() / FY < 0.03, "fy={fy}");
    assert!((cx - CX).abs() < 15.0, "cx={cx}");
    assert!((cy - CY).abs() < 15.0, "cy={cy}");
    assert!(json["rms"].as_f64().unwrap() < 0.3);
    assert_eq!(json["image_width"], 640);
    assert_eq!(json["views"], 5);
}

#[test]
fn calibration_skips_view_with_other_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let rvecs = [
        [0.3, 0.0, 0.05],
        [-0.3, 0.1, 0.0],
        [0.0, 0.35, -0.05],
        [0.1, -0.35, 0.1],
    ];
    for (i, rvec) in rvecs.iter().enumerate() {
        render_view(*rvec, &dir.path().join(format!("view{i}.png")));
    }
    render_view_sized([0.25, 0.25, 0.0], 800, 600, &dir.path().join("view5.png"));

    let out = dir.path().join("out");
    Command::cargo_bin("camera-calibration")
        .unwrap()
        .args(["--in-mask", &format!("{}/view*.png", dir.path().display())])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Chessboard found in"))
        .stderr(predicate::str::contains("skipping"))
        .stderr(predicate::str::contains("size 800x600 differs from 640x480"))
        .stderr(predicate::str::contains("Images passed chessboard detection: 4"));

    for i in 0..4 {
        assert!(out.join(format!("view{i}_output.bmp")).is_file());
    }
    assert!(!out.join("view5_output.bmp").exists());
    let raw = std::fs::read_to_string(out.join("calibration.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["views"], 4);
    assert_eq!(json["image_width"], 640);
    assert_eq!(json["image_height"], 480);
}

#[test]
fn motion_help_lists_flags() {
    Command::cargo_bin("motion-detect")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--out-dir"));
}

#[test]
fn motion_reports_moving_square() {
    let dir = tempfile::tempdir().unwrap();
    traffic(dir.path());
    let out = dir.path().join("motion");
    Command::cargo_bin("motion-detect")
        .unwrap()
        .args(["--input", &format!("{}/frame_*.png", dir.path().display())])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Resolution: 80x60"))
        .stderr(predicate::str::contains("frame 4: motion"))
        .stderr(predicate::str::contains(
            "6 frames, 1 with motion, 1 background resets",
        ));
    assert!(out.join("motion_00004.png").is_file());
    assert!(!out.join("motion_00003.png").exists());
}

#[test]
fn motion_config_overrides_threshold() {
    let dir = tempfile::tempdir().unwrap();
    traffic(dir.path());
    let config = dir.path().join("motion.json");
    std::fs::write(&config, r#"{ "threshold": 250 }"#).unwrap();
    Command::cargo_bin("motion-detect")
        .unwrap()
        .args(["--input", dir.path().to_str().unwrap()])
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("0 with motion"));
}

#[test]
fn motion_without_frames_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("motion-detect")
        .unwrap()
        .args(["--input", &format!("{}/*.png", dir.path().display())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to open"));
}
