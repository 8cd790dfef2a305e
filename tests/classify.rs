use rand::{Rng, SeedableRng};
use typescope::tables::{lookup_signature, SIGNATURES};
use typescope::{aggregate, classify, classify_file, format_size, ClassificationResult, DetectionMethod};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

fn unit_index(formatted: &str) -> usize {
    let unit = formatted.rsplit(' ').next().unwrap();
    UNITS.iter().position(|u| *u == unit).unwrap()
}

fn unmatched_header(rng: &mut impl Rng) -> Vec<u8> {
    loop {
        let mut header = vec![0u8; 64];
        rng.fill(&mut header[..]);
        if lookup_signature(&header).is_none() {
            return header;
        }
    }
}

#[test]
fn signature_wins_over_any_extension() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let names = ["photo.txt", "notes.v", "model.stl", "noext", "file.xyz"];

    for sig in SIGNATURES {
        for name in names {
            let mut header = sig.prefix.to_vec();
            let tail: usize = rng.gen_range(0..256);
            header.extend((0..tail).map(|_| rng.gen::<u8>()));

            let c = classify(&header, name, header.len() as u64);
            let expected = lookup_signature(&header).unwrap();
            assert_eq!(c.filetype, expected.kind.label, "{name}");
            assert_eq!(c.category, expected.kind.category);
            assert_eq!(c.detection_method, DetectionMethod::Signature);
        }
    }
}

#[test]
fn png_header_named_txt() {
    let mut header = b"\x89PNG\r\n\x1a\n".to_vec();
    header.resize(1024, 0);
    let c = classify(&header, "photo.txt", 2048);
    assert_eq!(c.filetype, "PNG");
    assert_eq!(c.category, "Image");
    assert_eq!(c.detection_method, DetectionMethod::Signature);
    assert_eq!(c.filesize, "2.0 KB");
}

#[test]
fn extension_fallback() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let header = unmatched_header(&mut rng);
    let c = classify(&header, "notes.v", 500);
    assert_eq!(c.filetype, "Verilog");
    assert_eq!(c.category, "HDL");
    assert_eq!(c.detection_method, DetectionMethod::Extension);
    assert_eq!(c.filesize, "500.0 B");

    let upper = classify(&header, "TOP.SV", 1);
    assert_eq!(upper.filetype, "SystemVerilog");
    assert_eq!(upper.extension, "SV");
}

#[test]
fn unknown_extension_or_none() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(13);
    for name in ["file.xyz", "Makefile", ".profile", "trailing."] {
        let header = unmatched_header(&mut rng);
        let c = classify(&header, name, 0);
        assert_eq!((c.filetype, c.category), ("UNKNOWN", "Unknown"), "{name}");
        assert_eq!(c.detection_method, DetectionMethod::Unknown);
        assert_eq!(c.filesize, "0.0 B");
    }
}

#[test]
fn format_size_unit_is_monotonic() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(17);
    for _ in 0..2000 {
        let shift_a: u32 = rng.gen_range(0..50);
        let shift_b: u32 = rng.gen_range(0..50);
        let a = rng.gen::<u64>() >> (14 + shift_a);
        let b = rng.gen::<u64>() >> (14 + shift_b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        assert!(unit_index(&format_size(lo)) <= unit_index(&format_size(hi)), "{lo} vs {hi}");
    }
}

#[test]
fn aggregate_counts_categories() {
    let results: Vec<ClassificationResult> = [("a.png", 1024u64), ("b.v", 512), ("c.jpg", 512)]
        .into_iter()
        .map(|(name, size)| ClassificationResult::Classified(classify(b"", name, size)))
        .collect();
    let stats = aggregate(&results);
    assert_eq!(stats.count, 3);
    assert_eq!(stats.categories.len(), 2);
    assert_eq!(stats.categories["Image"], 2);
    assert_eq!(stats.categories["HDL"], 1);
    assert_eq!(stats.total_size, "2.0 KB");
}

#[test]
fn classify_file_reads_header_and_true_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    let mut data = b"%PDF-1.7\n".to_vec();
    data.resize(4096, b'x');
    std::fs::write(&path, &data).unwrap();

    match classify_file(&path, "scan.bin") {
        ClassificationResult::Classified(c) => {
            assert_eq!(c.filetype, "PDF");
            assert_eq!(c.filesize_bytes, 4096);
            assert_eq!(c.filesize, "4.0 KB");
            assert_eq!(c.filename, "scan.bin");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_file_is_reported_in_band() {
    let dir = tempfile::tempdir().unwrap();
    let result = classify_file(&dir.path().join("gone.png"), "gone.png");
    match &result {
        ClassificationResult::Error { filename, error } => {
            assert_eq!(filename, "gone.png");
            assert!(error.contains("File not found"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let stats = aggregate(&[result]);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_size, "0.0 B");
    assert!(stats.categories.is_empty());
}
