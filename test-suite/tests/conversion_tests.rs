//! Conversion suite against the stand-in converter and rasterizer
//!
//! Each test records a reference, then verifies fresh output against it.

use std::fs;

use golden_harness::oracle::ReferenceRecord;
use golden_harness::suite::CONVERSION_SUITE;
use golden_harness::{
    CaseOutcome, ConversionCase, Harness, HarnessConfig, HarnessError, OracleMode, Settlement,
    StaticRenderer,
};
use golden_harness_test_suite::catalog::conversion_cases;
use golden_harness_test_suite::stub_document;
use golden_harness_test_suite::utils::Fixtures;
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};

const STUB_CONVERTER: &str = env!("CARGO_BIN_EXE_stub-converter");
const STUB_RASTERIZER: &str = env!("CARGO_BIN_EXE_stub-rasterizer");

fn fixtures_with_inputs() -> Fixtures {
    let fixtures = Fixtures::new().unwrap();
    for case in conversion_cases() {
        fixtures
            .write_input(CONVERSION_SUITE, &case.input, &stub_document(2, &case.name))
            .unwrap();
    }
    fixtures
}

fn renderer() -> StaticRenderer {
    StaticRenderer::compatible(STUB_RASTERIZER)
}

fn harness(config: HarnessConfig, mode: OracleMode) -> Harness {
    Harness::new(HarnessConfig { mode, ..config }).unwrap()
}

fn basic_text() -> ConversionCase {
    conversion_cases().remove(0)
}

#[test]
fn test_record_then_verify() {
    let fixtures = fixtures_with_inputs();
    let config = fixtures.config(STUB_CONVERTER);

    let recorder = harness(config.clone(), OracleMode::Record);
    for case in conversion_cases() {
        let outcome = recorder.check_conversion(&case, &renderer()).unwrap();
        let reference = fixtures.suite_dir(CONVERSION_SUITE).join(format!("{}.png", case.name));
        assert_eq!(outcome, CaseOutcome::Settled(Settlement::Recorded { reference }));
    }

    let verifier = harness(config, OracleMode::Verify);
    for case in conversion_cases() {
        match verifier.check_conversion(&case, &renderer()) {
            Ok(CaseOutcome::Settled(Settlement::Verified(verdict))) => {
                assert!(verdict.pass, "{}", case.name);
                assert_eq!(verdict.diff_pixel_count, 0);
            }
            other => panic!("{}: {:?}", case.name, other),
        }
    }
}

#[test]
fn test_render_args_shape_the_image() {
    let fixtures = fixtures_with_inputs();
    let recorder = harness(fixtures.config(STUB_CONVERTER), OracleMode::Record);
    for case in conversion_cases() {
        recorder.check_conversion(&case, &renderer()).unwrap();
    }

    let dimensions = |name: &str| {
        image::image_dimensions(fixtures.suite_dir(CONVERSION_SUITE).join(format!("{}.png", name))).unwrap()
    };
    assert_eq!(dimensions("basic_text"), (220, 260));
    assert_eq!(dimensions("geneve_1564"), (800, 1100));
    assert_eq!(dimensions("text_visibility"), (800, 1200));
}

#[test]
fn test_recording_writes_sidecar() {
    let fixtures = fixtures_with_inputs();
    let recorder = harness(fixtures.config(STUB_CONVERTER), OracleMode::Record);
    recorder.check_conversion(&basic_text(), &renderer()).unwrap();

    let reference = fixtures.suite_dir(CONVERSION_SUITE).join("basic_text.png");
    let record = ReferenceRecord::read(&reference).unwrap();
    assert_eq!(record.case, "basic_text");
    assert_eq!(record.sha256, hex::encode(Sha256::digest(fs::read(&reference).unwrap())));
}

#[test]
fn test_changed_output_is_pixel_mismatch_with_diff() {
    let fixtures = fixtures_with_inputs();
    let config = HarnessConfig {
        preserve_temp: true,
        ..fixtures.config(STUB_CONVERTER)
    };
    harness(config.clone(), OracleMode::Record)
        .check_conversion(&basic_text(), &renderer())
        .unwrap();

    fixtures
        .write_input(CONVERSION_SUITE, "basic_text.pdf", &stub_document(2, "changed"))
        .unwrap();
    let error = harness(config, OracleMode::Verify)
        .check_conversion(&basic_text(), &renderer())
        .unwrap_err();

    match error {
        HarnessError::PixelMismatch {
            diff_pixels,
            total_pixels,
            diff_image,
            ..
        } => {
            assert!(diff_pixels > 0);
            assert_eq!(total_pixels, 220 * 260);
            let diff_image = diff_image.expect("diff image written");
            assert_eq!(
                diff_image,
                fixtures.preserve_dir().join("png_out").join("basic_text.diff.png")
            );
            assert!(diff_image.exists());
        }
        other => panic!("expected a pixel mismatch, got {:?}", other),
    }
}

#[test]
fn test_size_change_is_dimension_mismatch() {
    let fixtures = fixtures_with_inputs();
    let config = fixtures.config(STUB_CONVERTER);
    let case = conversion_cases().remove(1);
    harness(config.clone(), OracleMode::Record)
        .check_conversion(&case, &renderer())
        .unwrap();

    let taller = ConversionCase {
        render_args: vec!["--height".to_string(), "1300".to_string()],
        ..case
    };
    let error = harness(config, OracleMode::Verify)
        .check_conversion(&taller, &renderer())
        .unwrap_err();
    assert!(
        matches!(
            error,
            HarnessError::DimensionMismatch {
                reference: (800, 1100),
                candidate: (800, 1300),
            }
        ),
        "{error}"
    );
}

#[test]
fn test_missing_reference_fails() {
    let fixtures = fixtures_with_inputs();
    let verifier = harness(fixtures.config(STUB_CONVERTER), OracleMode::Verify);

    let error = verifier.check_conversion(&basic_text(), &renderer()).unwrap_err();
    assert!(matches!(error, HarnessError::MissingReference(_)), "{error}");
    assert!(error.is_assertion());
}

#[test]
fn test_missing_rasterizer_is_environment_failure() {
    let fixtures = fixtures_with_inputs();
    let verifier = harness(fixtures.config(STUB_CONVERTER), OracleMode::Verify);
    let renderer = StaticRenderer::compatible(fixtures.root().join("no-rasterizer"));

    let error = verifier.check_conversion(&basic_text(), &renderer).unwrap_err();
    assert!(error.is_environment(), "{error}");
}

#[test]
fn test_non_pdf_input_is_rejected() {
    let fixtures = fixtures_with_inputs();
    let verifier = harness(fixtures.config(STUB_CONVERTER), OracleMode::Verify);
    let case = ConversionCase {
        input: "basic_text.txt".to_string(),
        ..basic_text()
    };
    assert!(matches!(
        verifier.check_conversion(&case, &renderer()),
        Err(HarnessError::Config(_))
    ));
}
