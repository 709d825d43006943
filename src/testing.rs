//! Test support: synthetic managed modules, archives and a scripted confirmer.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::ManagerConfig;
use crate::confirm::{Choice, Confirmer, Prompt, VersionSelection};

const SECTION_RVA: u32 = 0x2000;
const FILE_ALIGNMENT: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;

struct AttributeSpec {
    namespace: String,
    name: String,
    args: Vec<String>,
}

struct TypeSpec {
    name: String,
    enclosing: Option<usize>,
    attribute: Option<AttributeSpec>,
}

/// Builds a minimal PE32 image with CLI metadata: one module, a type per
/// `with_*` call, and at most one custom attribute per type.
#[derive(Default)]
pub struct ModuleImage {
    types: Vec<TypeSpec>,
}

impl ModuleImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: &str) -> Self {
        self.types.push(TypeSpec {
            name: name.to_string(),
            enclosing: None,
            attribute: None,
        });
        self
    }

    pub fn with_attribute(mut self, namespace: &str, name: &str, args: &[&str]) -> Self {
        let index = self.types.len();
        self.types.push(TypeSpec {
            name: format!("Attributed{index}"),
            enclosing: None,
            attribute: Some(AttributeSpec {
                namespace: namespace.to_string(),
                name: name.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            }),
        });
        self
    }

    pub fn with_plugin(self, guid: &str, name: &str, version: &str) -> Self {
        self.with_attribute("BepInEx", "BepInPlugin", &[guid, name, version])
    }

    pub fn with_nested_plugin(mut self, guid: &str, name: &str, version: &str) -> Self {
        let outer = self.types.len();
        self.types.push(TypeSpec {
            name: "Outer".to_string(),
            enclosing: None,
            attribute: None,
        });
        self.types.push(TypeSpec {
            name: "Inner".to_string(),
            enclosing: Some(outer),
            attribute: Some(AttributeSpec {
                namespace: "BepInEx".to_string(),
                name: "BepInPlugin".to_string(),
                args: vec![guid.to_string(), name.to_string(), version.to_string()],
            }),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let metadata = self.metadata();
        let mut text = vec![0u8; CLI_HEADER_SIZE];
        put_u32(&mut text, 0, CLI_HEADER_SIZE as u32);
        put_u16(&mut text, 4, 2);
        put_u16(&mut text, 6, 5);
        put_u32(&mut text, 8, SECTION_RVA + CLI_HEADER_SIZE as u32);
        put_u32(&mut text, 12, metadata.len() as u32);
        put_u32(&mut text, 16, 1);
        text.extend_from_slice(&metadata);
        pe_image(text, true)
    }

    /// A PE image without a CLI header, like a native library.
    pub fn build_native(&self) -> Vec<u8> {
        pe_image(vec![0xC3; 16], false)
    }

    fn metadata(&self) -> Vec<u8> {
        let mut strings = vec![0u8];
        let mut blobs = vec![0u8];

        let mut type_refs = Vec::new();
        let mut member_refs = Vec::new();
        let mut attributes = Vec::new();
        let mut type_defs = vec![(0x0000_0000u32, intern(&mut strings, "<Module>"), 0u16)];
        let mut nested = Vec::new();

        for (index, spec) in self.types.iter().enumerate() {
            let row = (index + 2) as u16;
            let flags = if spec.enclosing.is_some() { 0x02 } else { 0x01 };
            let ns = if spec.enclosing.is_some() {
                0
            } else {
                intern(&mut strings, "Mods")
            };
            type_defs.push((flags, intern(&mut strings, &spec.name), ns));
            if let Some(outer) = spec.enclosing {
                nested.push((row, (outer + 2) as u16));
            }

            if let Some(attr) = &spec.attribute {
                type_refs.push((
                    intern(&mut strings, &attr.name),
                    intern(&mut strings, &attr.namespace),
                ));
                let type_ref_row = type_refs.len() as u16;

                let mut signature = vec![0x20, attr.args.len() as u8, 0x01];
                signature.extend(std::iter::repeat(0x0E).take(attr.args.len()));
                member_refs.push((
                    (type_ref_row << 3) | 1,
                    intern(&mut strings, ".ctor"),
                    blob(&mut blobs, &signature),
                ));
                let member_ref_row = member_refs.len() as u16;

                let mut value = vec![0x01, 0x00];
                for arg in &attr.args {
                    value.extend(compress(arg.len()));
                    value.extend_from_slice(arg.as_bytes());
                }
                value.extend_from_slice(&[0x00, 0x00]);
                attributes.push((
                    (row << 5) | 3,
                    (member_ref_row << 3) | 3,
                    blob(&mut blobs, &value),
                ));
            }
        }
        let module_name = intern(&mut strings, "Synthetic.dll");

        let mut tables = Vec::new();
        let mut valid = 0u64;
        let mut counts = Vec::new();
        let mut present = |id: u32, rows: usize| {
            if rows > 0 {
                valid |= 1 << id;
                counts.push(rows as u32);
            }
        };
        present(0x00, 1);
        present(0x01, type_refs.len());
        present(0x02, type_defs.len());
        present(0x0A, member_refs.len());
        present(0x0C, attributes.len());
        present(0x29, nested.len());

        tables.extend_from_slice(&0u32.to_le_bytes());
        tables.extend_from_slice(&[2, 0, 0, 1]);
        tables.extend_from_slice(&valid.to_le_bytes());
        tables.extend_from_slice(&0u64.to_le_bytes());
        for count in counts {
            tables.extend_from_slice(&count.to_le_bytes());
        }

        for value in [0u16, module_name, 1, 0, 0] {
            tables.extend_from_slice(&value.to_le_bytes());
        }
        for (name, ns) in &type_refs {
            for value in [0u16, *name, *ns] {
                tables.extend_from_slice(&value.to_le_bytes());
            }
        }
        for (flags, name, ns) in &type_defs {
            tables.extend_from_slice(&flags.to_le_bytes());
            for value in [*name, *ns, 0, 1, 1] {
                tables.extend_from_slice(&value.to_le_bytes());
            }
        }
        for (class, name, sig) in &member_refs {
            for value in [*class, *name, *sig] {
                tables.extend_from_slice(&value.to_le_bytes());
            }
        }
        for (parent, ctor, value) in &attributes {
            for v in [*parent, *ctor, *value] {
                tables.extend_from_slice(&v.to_le_bytes());
            }
        }
        for (inner, outer) in &nested {
            tables.extend_from_slice(&inner.to_le_bytes());
            tables.extend_from_slice(&outer.to_le_bytes());
        }

        let guids = vec![0x5Au8; 16];
        let streams: [(&str, Vec<u8>); 4] = [
            ("#~", tables),
            ("#Strings", strings),
            ("#Blob", blobs),
            ("#GUID", guids),
        ];

        let version = b"v4.0.30319\0\0";
        let header_len = 16
            + version.len()
            + 4
            + streams
                .iter()
                .map(|(name, _)| 8 + (name.len() + 4) / 4 * 4)
                .sum::<usize>();

        let mut root = Vec::new();
        root.extend_from_slice(&0x424A_5342u32.to_le_bytes());
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&1u16.to_le_bytes());
        root.extend_from_slice(&0u32.to_le_bytes());
        root.extend_from_slice(&(version.len() as u32).to_le_bytes());
        root.extend_from_slice(version);
        root.extend_from_slice(&0u16.to_le_bytes());
        root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        let mut offset = header_len;
        let mut bodies = Vec::new();
        for (name, body) in &streams {
            let padded = (body.len() + 3) / 4 * 4;
            root.extend_from_slice(&(offset as u32).to_le_bytes());
            root.extend_from_slice(&(padded as u32).to_le_bytes());
            let mut raw_name = name.as_bytes().to_vec();
            raw_name.resize((name.len() + 4) / 4 * 4, 0);
            root.extend_from_slice(&raw_name);

            let mut body = body.clone();
            body.resize(padded, 0);
            bodies.extend_from_slice(&body);
            offset += padded;
        }
        root.extend_from_slice(&bodies);
        root
    }
}

fn pe_image(text: Vec<u8>, managed: bool) -> Vec<u8> {
    let pe_offset = 0x80usize;
    let optional_size = 224usize;
    let raw_size = (text.len() + FILE_ALIGNMENT - 1) / FILE_ALIGNMENT * FILE_ALIGNMENT;

    let mut image = vec![0u8; FILE_ALIGNMENT];
    image[0..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3C, pe_offset as u32);
    image[pe_offset..pe_offset + 4].copy_from_slice(b"PE\0\0");

    let coff = pe_offset + 4;
    put_u16(&mut image, coff, 0x014C);
    put_u16(&mut image, coff + 2, 1);
    put_u16(&mut image, coff + 16, optional_size as u16);
    put_u16(&mut image, coff + 18, 0x2102);

    let optional = coff + 20;
    put_u16(&mut image, optional, 0x10B);
    put_u32(&mut image, optional + 92, 16);
    if managed {
        put_u32(&mut image, optional + 96 + 14 * 8, SECTION_RVA);
        put_u32(&mut image, optional + 96 + 14 * 8 + 4, CLI_HEADER_SIZE as u32);
    }

    let section = optional + optional_size;
    image[section..section + 5].copy_from_slice(b".text");
    put_u32(&mut image, section + 8, text.len() as u32);
    put_u32(&mut image, section + 12, SECTION_RVA);
    put_u32(&mut image, section + 16, raw_size as u32);
    put_u32(&mut image, section + 20, FILE_ALIGNMENT as u32);

    let mut text = text;
    text.resize(raw_size, 0);
    image.extend_from_slice(&text);
    image
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn intern(heap: &mut Vec<u8>, value: &str) -> u16 {
    let index = heap.len() as u16;
    heap.extend_from_slice(value.as_bytes());
    heap.push(0);
    index
}

fn compress(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        vec![0x80 | (len >> 8) as u8, len as u8]
    }
}

fn blob(heap: &mut Vec<u8>, value: &[u8]) -> u16 {
    let index = heap.len() as u16;
    heap.extend(compress(value.len()));
    heap.extend_from_slice(value);
    index
}

pub fn plugin_bytes(guid: &str, name: &str, version: &str) -> Vec<u8> {
    ModuleImage::new()
        .with_type("Helpers")
        .with_plugin(guid, name, version)
        .build()
}

/// A managed module without the identity annotation.
pub fn dependency_bytes() -> Vec<u8> {
    ModuleImage::new()
        .with_attribute("System.Reflection", "AssemblyTitleAttribute", &["Shared"])
        .build()
}

pub fn write_file(path: &Path, contents: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    path.to_path_buf()
}

pub fn write_plugin(path: &Path, guid: &str, name: &str, version: &str) -> PathBuf {
    write_file(path, &plugin_bytes(guid, name, version))
}

/// A game folder with `BepInEx/plugins` created.
pub fn game_root() -> (TempDir, ManagerConfig) {
    let temp = TempDir::new().unwrap();
    let config = ManagerConfig::new(temp.path());
    fs::create_dir_all(config.plugins_dir()).unwrap();
    (temp, config)
}

pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

pub fn write_tar_gz(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

pub fn write_7z(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut writer = sevenz_rust::SevenZWriter::create(path).unwrap();
    for (name, data) in entries {
        let mut entry = sevenz_rust::SevenZArchiveEntry::default();
        entry.name = name.to_string();
        entry.has_stream = true;
        writer.push_archive_entry(entry, Some(data.as_slice())).unwrap();
    }
    writer.finish().unwrap();
}

/// Sorted relative file paths with contents, for comparing trees.
pub fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

/// Answers prompts from a queue and records what was asked.
#[derive(Default)]
pub struct ScriptedConfirmer {
    choices: VecDeque<Choice>,
    selection: Option<VersionSelection>,
    pub asked: Vec<String>,
}

impl ScriptedConfirmer {
    pub fn new(choices: &[Choice]) -> Self {
        Self {
            choices: choices.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: VersionSelection) -> Self {
        self.selection = Some(selection);
        self
    }
}

impl Confirmer for ScriptedConfirmer {
    fn ask_choice(&mut self, prompt: &Prompt<'_>) -> Choice {
        self.asked.push(prompt.title().to_string());
        self.choices.pop_front().unwrap_or(Choice::Cancel)
    }

    fn pick_versions(
        &mut self,
        _display_name: &str,
        _active_version: &str,
        _stored: &[String],
    ) -> Option<VersionSelection> {
        self.asked.push("pick versions".to_string());
        self.selection.take()
    }
}
