// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn renders_a_small_ppm() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.ppm");

    Command::cargo_bin("mandelview")
        .unwrap()
        .args(&["--output", path.to_str().unwrap(), "--size", "16x8", "--threads", "1"])
        .assert()
        .success();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"P6"));
    assert!(bytes.len() > 16 * 8 * 3);
}

#[test]
fn mono_alpha_and_negative_center_are_accepted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mono.ppm");

    Command::cargo_bin("mandelview")
        .unwrap()
        .args(&[
            "-o",
            path.to_str().unwrap(),
            "-s",
            "12x12",
            "-c",
            "-0.5,0.25",
            "-w",
            "-3",
            "-m",
            "-a",
        ])
        .assert()
        .success();

    assert!(path.exists());
}

#[test]
fn rejects_a_malformed_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never.ppm");

    Command::cargo_bin("mandelview")
        .unwrap()
        .args(&["--output", path.to_str().unwrap(), "--size", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse output image size"));

    assert!(!path.exists());
}

#[test]
fn requires_an_output() {
    Command::cargo_bin("mandelview")
        .unwrap()
        .assert()
        .failure();
}
