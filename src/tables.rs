use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A coarse label/category pair, e.g. `("Verilog", "HDL")`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileKind {
    pub label: &'static str,
    pub category: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct Signature {
    pub prefix: &'static [u8],
    pub kind: FileKind,
}

const fn sig(prefix: &'static [u8], label: &'static str, category: &'static str) -> Signature {
    Signature { prefix, kind: FileKind { label, category } }
}

/// Magic-byte prefixes, matched at offset 0. First match wins, so declaration
/// order is the tie-break for any future overlapping entries.
pub static SIGNATURES: &[Signature] = &[
    sig(b"\x89PNG\r\n\x1a\n", "PNG", "Image"),
    sig(b"\xff\xd8\xff", "JPEG", "Image"),
    sig(b"GIF87a", "GIF87a", "Image"),
    sig(b"GIF89a", "GIF89a", "Image"),
    sig(b"%PDF", "PDF", "Document"),
    sig(b"PK\x03\x04", "ZIP/DOCX/XLSX", "Archive"),
    sig(b"Rar!\x1a\x07", "RAR", "Archive"),
    sig(b"7z\xbc\xaf\x27\x1c", "7Z", "Archive"),
    sig(b"\x00\x00\x00\x20ftyp", "MP4", "Video"),
    sig(b"\x1aE\xdf\xa3", "MKV", "Video"),
    sig(b"RIFF", "AVI/WAV", "Media"),
    sig(b"\xff\xfb", "MP3", "Audio"),
    sig(b"fLaC", "FLAC", "Audio"),
    sig(b"MZ", "EXE", "Executable"),
    sig(b"\x7fELF", "ELF", "Executable"),
    sig(b"BM", "BMP", "Image"),
    sig(b"II\x2a\x00", "TIFF", "Image"),
    sig(b"MM\x00\x2a", "TIFF", "Image"),
    sig(b"<?xml", "XML", "Code"),
    sig(b"<!DOCTYPE", "HTML", "Code"),
    sig(b"{", "JSON", "Code"),
    sig(b"solid ", "STL", "3D Model"),
    sig(b"glTF", "glTF", "3D Model"),
];

const EXTENSION_ENTRIES: &[(&str, &str, &str)] = &[
    // images
    ("png", "PNG", "Image"),
    ("jpg", "JPEG", "Image"),
    ("jpeg", "JPEG", "Image"),
    ("gif", "GIF", "Image"),
    ("bmp", "BMP", "Image"),
    ("svg", "SVG", "Image"),
    ("tiff", "TIFF", "Image"),
    ("webp", "WebP", "Image"),
    ("ico", "ICO", "Image"),
    // documents
    ("pdf", "PDF", "Document"),
    ("docx", "DOCX", "Document"),
    ("doc", "DOC", "Document"),
    ("xlsx", "XLSX", "Spreadsheet"),
    ("xls", "XLS", "Spreadsheet"),
    ("csv", "CSV", "Spreadsheet"),
    ("txt", "TXT", "Text"),
    ("pptx", "PPTX", "Presentation"),
    ("ppt", "PPT", "Presentation"),
    // video / audio
    ("mp4", "MP4", "Video"),
    ("mkv", "MKV", "Video"),
    ("avi", "AVI", "Video"),
    ("mov", "MOV", "Video"),
    ("mp3", "MP3", "Audio"),
    ("wav", "WAV", "Audio"),
    ("flac", "FLAC", "Audio"),
    ("m4a", "M4A", "Audio"),
    ("webm", "WebM", "Video"),
    // code and scripts
    ("py", "Python", "Code"),
    ("js", "JavaScript", "Code"),
    ("ts", "TypeScript", "Code"),
    ("cpp", "C++", "Code"),
    ("c", "C", "Code"),
    ("java", "Java", "Code"),
    ("go", "Go", "Code"),
    ("rs", "Rust", "Code"),
    ("php", "PHP", "Code"),
    ("sh", "Shell", "Script"),
    ("bat", "Batch", "Script"),
    ("ps1", "PowerShell", "Script"),
    // hardware description
    ("v", "Verilog", "HDL"),
    ("vh", "Verilog Header", "HDL"),
    ("vhd", "VHDL", "HDL"),
    ("sv", "SystemVerilog", "HDL"),
    // 3d models
    ("stl", "STL", "3D Model"),
    ("obj", "OBJ", "3D Model"),
    ("fbx", "FBX", "3D Model"),
    ("gltf", "glTF", "3D Model"),
    ("glb", "glTF Binary", "3D Model"),
    ("ply", "PLY", "3D Model"),
    ("blend", "Blender", "3D Model"),
    ("dae", "Collada", "3D Model"),
    ("usdz", "USDZ", "3D Model"),
    // archives and data
    ("zip", "ZIP", "Archive"),
    ("rar", "RAR", "Archive"),
    ("7z", "7Z", "Archive"),
    ("m", "MATLAB", "Code"),
    ("mat", "MATLAB Data", "Data"),
    ("json", "JSON", "Code"),
    ("xml", "XML", "Code"),
    ("html", "HTML", "Code"),
    ("sql", "SQL", "Database"),
];

/// Lowercase extension (no dot) to kind. Built once, never mutated.
pub static EXTENSIONS: Lazy<HashMap<&'static str, FileKind>> = Lazy::new(|| {
    EXTENSION_ENTRIES
        .iter()
        .map(|&(ext, label, category)| (ext, FileKind { label, category }))
        .collect()
});

pub fn lookup_signature(header: &[u8]) -> Option<&'static Signature> {
    SIGNATURES.iter().find(|s| header.starts_with(s.prefix))
}

/// `ext` must already be lowercase and dot-free.
pub fn lookup_extension(ext: &str) -> Option<FileKind> {
    EXTENSIONS.get(ext).copied()
}
