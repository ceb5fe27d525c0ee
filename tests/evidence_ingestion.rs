//! Integration tests for the evidence ingestion pipeline

mod common;

use common::TestContext;
use planvault_lib::evidence::EvidenceError;
use planvault_lib::validation::ValidationError;
use planvault_lib::{audit, StoreConfig};
use sha2::{Digest, Sha256};

#[test]
fn test_upload_hash_matches_stored_bytes() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let outcome = ctx
        .upload(plan_id, "report.pdf", Some("application/pdf"), b"0123456789")
        .unwrap();

    assert_eq!(outcome.filename, "report.pdf");
    assert_eq!(outcome.size_bytes, 10);
    // Deterministic digest of the exact 10 bytes
    assert_eq!(
        outcome.sha256,
        "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882"
    );

    // The recorded hash equals the hash of the bytes actually on disk
    let stored = std::fs::read(ctx.config.upload_dir.join(&outcome.filename)).unwrap();
    assert_eq!(outcome.sha256, hex::encode(Sha256::digest(&stored)));

    let records = ctx.db.evidence_for_plan(plan_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, outcome.id);
    assert_eq!(records[0].sha256, outcome.sha256);
    assert_eq!(records[0].size_bytes, 10);
}

#[test]
fn test_oversized_upload_leaves_no_record_and_no_file() {
    let mut ctx = TestContext::new().unwrap();
    ctx.config.max_upload_bytes = 16;
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let result = ctx.upload(plan_id, "big.txt", None, &[b'x'; 17]);
    assert!(matches!(
        result,
        Err(EvidenceError::PayloadTooLarge { max_bytes: 16 })
    ));

    assert!(ctx.uploaded_files().is_empty());
    assert!(ctx.db.evidence_for_plan(plan_id).unwrap().is_empty());
}

#[test]
fn test_upload_at_exact_cap_is_accepted() {
    let mut ctx = TestContext::new().unwrap();
    ctx.config.max_upload_bytes = 16;
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let outcome = ctx.upload(plan_id, "cap.txt", None, &[b'x'; 16]).unwrap();
    assert_eq!(outcome.size_bytes, 16);
}

#[test]
fn test_empty_upload_rejected() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let result = ctx.upload(plan_id, "empty.txt", None, b"");
    assert!(matches!(
        result,
        Err(EvidenceError::Invalid(ValidationError::EmptyFile))
    ));
    assert!(ctx.uploaded_files().is_empty());
}

#[test]
fn test_duplicate_content_stores_one_file_two_records() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let first = ctx.upload(plan_id, "photo.png", None, b"same bytes").unwrap();
    let second = ctx.upload(plan_id, "photo.png", None, b"same bytes").unwrap();

    assert_eq!(first.filename, "photo.png");
    assert_eq!(second.filename, "photo.png");
    assert_eq!(first.sha256, second.sha256);
    assert_ne!(first.id, second.id);

    // One physical blob, two records: one per upload event
    assert_eq!(ctx.uploaded_files(), vec!["photo.png".to_string()]);
    assert_eq!(ctx.db.evidence_for_plan(plan_id).unwrap().len(), 2);
}

#[test]
fn test_name_collision_with_different_content_gets_suffix() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let first = ctx.upload(plan_id, "notes.txt", None, b"alpha").unwrap();
    let second = ctx.upload(plan_id, "notes.txt", None, b"beta").unwrap();
    let third = ctx.upload(plan_id, "notes.txt", None, b"gamma").unwrap();

    assert_eq!(first.filename, "notes.txt");
    assert_eq!(second.filename, "notes_1.txt");
    assert_eq!(third.filename, "notes_2.txt");

    assert_eq!(
        std::fs::read(ctx.config.upload_dir.join("notes_1.txt")).unwrap(),
        b"beta"
    );
    // Each record's hash matches the bytes written for that record
    assert_eq!(second.sha256, hex::encode(Sha256::digest(b"beta")));
}

#[test]
fn test_unknown_plan_rejected_before_any_side_effect() {
    let ctx = TestContext::new().unwrap();

    let result = ctx.upload(999, "report.pdf", None, b"payload");
    assert!(matches!(result, Err(EvidenceError::PlanNotFound(999))));
    assert!(ctx.uploaded_files().is_empty());
}

#[test]
fn test_disallowed_extension_message_enumerates_accepted() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let err = ctx.upload(plan_id, "tool.exe", None, b"MZ").unwrap_err();
    match err {
        EvidenceError::Invalid(ValidationError::ExtensionNotAllowed(allowed)) => {
            assert!(allowed.contains(".pdf"));
            assert!(allowed.contains(".xml"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(ctx.uploaded_files().is_empty());
    assert!(ctx.db.evidence_for_plan(plan_id).unwrap().is_empty());
}

#[test]
fn test_disallowed_content_type_rejected() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let result = ctx.upload(plan_id, "report.pdf", Some("application/x-dosexec"), b"%PDF");
    assert!(matches!(
        result,
        Err(EvidenceError::Invalid(ValidationError::MimeNotAllowed(_)))
    ));
}

#[test]
fn test_traversal_filename_is_confined_to_upload_dir() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let outcome = ctx
        .upload(plan_id, "../../escape.txt", None, b"contained")
        .unwrap();

    assert_eq!(outcome.filename, "escape.txt");
    assert!(ctx.config.upload_dir.join("escape.txt").exists());
    // Nothing escaped above the upload directory
    assert!(!ctx.temp_dir.path().join("escape.txt").exists());
}

#[test]
fn test_successful_upload_writes_audit_entry() {
    let ctx = TestContext::new().unwrap();
    let plan_id = ctx.db.create_plan("Operation Ledger").unwrap();

    let outcome = ctx.upload(plan_id, "log.csv", None, b"a,b,c").unwrap();

    let events = audit::recent(&ctx.db, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "upload_evidence");
    assert_eq!(events[0].plan_id, Some(plan_id));
    assert!(events[0].detail.contains(&outcome.sha256));
    assert!(events[0].detail.contains("log.csv"));
}

#[test]
fn test_config_defaults_are_documented_values() {
    let config = StoreConfig::default();
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
}
