//! Static reader for the CLI metadata embedded in managed PE modules.
//!
//! Only the pieces needed to find custom attributes on type definitions are
//! decoded: the PE section table, the CLI header, the metadata root with its
//! `#~`, `#Strings` and `#Blob` streams, and enough of the table schema to
//! locate rows. Nothing in the image is ever executed or mapped.
//!
//! Layouts follow ECMA-335 partition II, sections 24 and 25.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("image truncated at offset {0:#x}")]
    Truncated(usize),
    #[error("invalid {0} signature")]
    BadSignature(&'static str),
    #[error("image has no CLI header")]
    NotManaged,
    #[error("rva {0:#x} is not mapped by any section")]
    UnmappedRva(u32),
    #[error("metadata stream {0} is missing")]
    MissingStream(&'static str),
    #[error("string heap entry at {0:#x} is not valid UTF-8")]
    InvalidString(u32),
    #[error("row {row} out of range for table {table:#04x}")]
    RowOutOfRange { table: usize, row: u32 },
}

type Result<T> = std::result::Result<T, MetadataError>;

mod table {
    pub const MODULE: usize = 0x00;
    pub const TYPE_REF: usize = 0x01;
    pub const TYPE_DEF: usize = 0x02;
    pub const FIELD_PTR: usize = 0x03;
    pub const FIELD: usize = 0x04;
    pub const METHOD_PTR: usize = 0x05;
    pub const METHOD_DEF: usize = 0x06;
    pub const PARAM_PTR: usize = 0x07;
    pub const PARAM: usize = 0x08;
    pub const INTERFACE_IMPL: usize = 0x09;
    pub const MEMBER_REF: usize = 0x0A;
    pub const CONSTANT: usize = 0x0B;
    pub const CUSTOM_ATTRIBUTE: usize = 0x0C;
    pub const FIELD_MARSHAL: usize = 0x0D;
    pub const DECL_SECURITY: usize = 0x0E;
    pub const CLASS_LAYOUT: usize = 0x0F;
    pub const FIELD_LAYOUT: usize = 0x10;
    pub const STAND_ALONE_SIG: usize = 0x11;
    pub const EVENT_MAP: usize = 0x12;
    pub const EVENT_PTR: usize = 0x13;
    pub const EVENT: usize = 0x14;
    pub const PROPERTY_MAP: usize = 0x15;
    pub const PROPERTY_PTR: usize = 0x16;
    pub const PROPERTY: usize = 0x17;
    pub const METHOD_SEMANTICS: usize = 0x18;
    pub const METHOD_IMPL: usize = 0x19;
    pub const MODULE_REF: usize = 0x1A;
    pub const TYPE_SPEC: usize = 0x1B;
    pub const IMPL_MAP: usize = 0x1C;
    pub const FIELD_RVA: usize = 0x1D;
    pub const ENC_LOG: usize = 0x1E;
    pub const ENC_MAP: usize = 0x1F;
    pub const ASSEMBLY: usize = 0x20;
    pub const ASSEMBLY_PROCESSOR: usize = 0x21;
    pub const ASSEMBLY_OS: usize = 0x22;
    pub const ASSEMBLY_REF: usize = 0x23;
    pub const ASSEMBLY_REF_PROCESSOR: usize = 0x24;
    pub const ASSEMBLY_REF_OS: usize = 0x25;
    pub const FILE: usize = 0x26;
    pub const EXPORTED_TYPE: usize = 0x27;
    pub const MANIFEST_RESOURCE: usize = 0x28;
    pub const NESTED_CLASS: usize = 0x29;
    pub const GENERIC_PARAM: usize = 0x2A;
    pub const METHOD_SPEC: usize = 0x2B;
    pub const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;

    /// Highest table id with a known schema.
    pub const LAST_KNOWN: usize = GENERIC_PARAM_CONSTRAINT;
}

/// Marker for unused slots in a coded index tag space.
const UNUSED: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl Coded {
    fn tag_bits(self) -> u32 {
        match self {
            Self::HasFieldMarshal
            | Self::HasSemantics
            | Self::MethodDefOrRef
            | Self::MemberForwarded
            | Self::TypeOrMethodDef => 1,
            Self::TypeDefOrRef
            | Self::HasConstant
            | Self::HasDeclSecurity
            | Self::Implementation
            | Self::ResolutionScope => 2,
            Self::MemberRefParent | Self::CustomAttributeType => 3,
            Self::HasCustomAttribute => 5,
        }
    }

    fn tables(self) -> &'static [usize] {
        use table::*;
        match self {
            Self::TypeDefOrRef => &[TYPE_DEF, TYPE_REF, TYPE_SPEC],
            Self::HasConstant => &[FIELD, PARAM, PROPERTY],
            Self::HasCustomAttribute => &[
                METHOD_DEF,
                FIELD,
                TYPE_REF,
                TYPE_DEF,
                PARAM,
                INTERFACE_IMPL,
                MEMBER_REF,
                MODULE,
                DECL_SECURITY,
                PROPERTY,
                EVENT,
                STAND_ALONE_SIG,
                MODULE_REF,
                TYPE_SPEC,
                ASSEMBLY,
                ASSEMBLY_REF,
                FILE,
                EXPORTED_TYPE,
                MANIFEST_RESOURCE,
                GENERIC_PARAM,
                GENERIC_PARAM_CONSTRAINT,
                METHOD_SPEC,
            ],
            Self::HasFieldMarshal => &[FIELD, PARAM],
            Self::HasDeclSecurity => &[TYPE_DEF, METHOD_DEF, ASSEMBLY],
            Self::MemberRefParent => &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC],
            Self::HasSemantics => &[EVENT, PROPERTY],
            Self::MethodDefOrRef => &[METHOD_DEF, MEMBER_REF],
            Self::MemberForwarded => &[FIELD, METHOD_DEF],
            Self::Implementation => &[FILE, ASSEMBLY_REF, EXPORTED_TYPE],
            Self::CustomAttributeType => &[UNUSED, UNUSED, METHOD_DEF, MEMBER_REF, UNUSED],
            Self::ResolutionScope => &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF],
            Self::TypeOrMethodDef => &[TYPE_DEF, METHOD_DEF],
        }
    }

    /// Splits a coded value into (table id, 1-based row).
    fn decode(self, value: u32) -> Option<(usize, u32)> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let row = value >> bits;
        match self.tables().get(tag) {
            Some(&t) if t != UNUSED && row != 0 => Some((t, row)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Col {
    Fixed(usize),
    Str,
    Guid,
    Blob,
    Table(usize),
    CodedIndex(Coded),
}

fn schema(id: usize) -> &'static [Col] {
    use table::*;
    use Col::*;
    match id {
        MODULE => &[Fixed(2), Str, Guid, Guid, Guid],
        TYPE_REF => &[CodedIndex(Coded::ResolutionScope), Str, Str],
        TYPE_DEF => &[
            Fixed(4),
            Str,
            Str,
            CodedIndex(Coded::TypeDefOrRef),
            Table(FIELD),
            Table(METHOD_DEF),
        ],
        FIELD_PTR => &[Table(FIELD)],
        FIELD => &[Fixed(2), Str, Blob],
        METHOD_PTR => &[Table(METHOD_DEF)],
        METHOD_DEF => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Table(PARAM)],
        PARAM_PTR => &[Table(PARAM)],
        PARAM => &[Fixed(2), Fixed(2), Str],
        INTERFACE_IMPL => &[Table(TYPE_DEF), CodedIndex(Coded::TypeDefOrRef)],
        MEMBER_REF => &[CodedIndex(Coded::MemberRefParent), Str, Blob],
        CONSTANT => &[Fixed(2), CodedIndex(Coded::HasConstant), Blob],
        CUSTOM_ATTRIBUTE => &[
            CodedIndex(Coded::HasCustomAttribute),
            CodedIndex(Coded::CustomAttributeType),
            Blob,
        ],
        FIELD_MARSHAL => &[CodedIndex(Coded::HasFieldMarshal), Blob],
        DECL_SECURITY => &[Fixed(2), CodedIndex(Coded::HasDeclSecurity), Blob],
        CLASS_LAYOUT => &[Fixed(2), Fixed(4), Table(TYPE_DEF)],
        FIELD_LAYOUT => &[Fixed(4), Table(FIELD)],
        STAND_ALONE_SIG => &[Blob],
        EVENT_MAP => &[Table(TYPE_DEF), Table(EVENT)],
        EVENT_PTR => &[Table(EVENT)],
        EVENT => &[Fixed(2), Str, CodedIndex(Coded::TypeDefOrRef)],
        PROPERTY_MAP => &[Table(TYPE_DEF), Table(PROPERTY)],
        PROPERTY_PTR => &[Table(PROPERTY)],
        PROPERTY => &[Fixed(2), Str, Blob],
        METHOD_SEMANTICS => &[Fixed(2), Table(METHOD_DEF), CodedIndex(Coded::HasSemantics)],
        METHOD_IMPL => &[
            Table(TYPE_DEF),
            CodedIndex(Coded::MethodDefOrRef),
            CodedIndex(Coded::MethodDefOrRef),
        ],
        MODULE_REF => &[Str],
        TYPE_SPEC => &[Blob],
        IMPL_MAP => &[
            Fixed(2),
            CodedIndex(Coded::MemberForwarded),
            Str,
            Table(MODULE_REF),
        ],
        FIELD_RVA => &[Fixed(4), Table(FIELD)],
        ENC_LOG => &[Fixed(4), Fixed(4)],
        ENC_MAP => &[Fixed(4)],
        ASSEMBLY => &[
            Fixed(4),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(4),
            Blob,
            Str,
            Str,
        ],
        ASSEMBLY_PROCESSOR => &[Fixed(4)],
        ASSEMBLY_OS => &[Fixed(4), Fixed(4), Fixed(4)],
        ASSEMBLY_REF => &[
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(2),
            Fixed(4),
            Blob,
            Str,
            Str,
            Blob,
        ],
        ASSEMBLY_REF_PROCESSOR => &[Fixed(4), Table(ASSEMBLY_REF)],
        ASSEMBLY_REF_OS => &[Fixed(4), Fixed(4), Fixed(4), Table(ASSEMBLY_REF)],
        FILE => &[Fixed(4), Str, Blob],
        EXPORTED_TYPE => &[
            Fixed(4),
            Fixed(4),
            Str,
            Str,
            CodedIndex(Coded::Implementation),
        ],
        MANIFEST_RESOURCE => &[Fixed(4), Fixed(4), Str, CodedIndex(Coded::Implementation)],
        NESTED_CLASS => &[Table(TYPE_DEF), Table(TYPE_DEF)],
        GENERIC_PARAM => &[Fixed(2), Fixed(2), CodedIndex(Coded::TypeOrMethodDef), Str],
        METHOD_SPEC => &[CodedIndex(Coded::MethodDefOrRef), Blob],
        GENERIC_PARAM_CONSTRAINT => &[Table(GENERIC_PARAM), CodedIndex(Coded::TypeDefOrRef)],
        _ => &[],
    }
}

fn bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(MetadataError::Truncated(offset))
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let b = bytes(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let b = bytes(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    let b = bytes(data, offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Ok(u64::from_le_bytes(buf))
}

/// Decodes an ECMA-335 compressed unsigned integer, returning (value, width).
fn decompress(data: &[u8]) -> Option<(u32, usize)> {
    let b0 = *data.first()? as u32;
    if b0 & 0x80 == 0 {
        Some((b0, 1))
    } else if b0 & 0xC0 == 0x80 {
        let b1 = *data.get(1)? as u32;
        Some((((b0 & 0x3F) << 8) | b1, 2))
    } else if b0 & 0xE0 == 0xC0 {
        let rest = data.get(1..4)?;
        Some((
            ((b0 & 0x1F) << 24) | (rest[0] as u32) << 16 | (rest[1] as u32) << 8 | rest[2] as u32,
            4,
        ))
    } else {
        None
    }
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

fn rva_to_offset(sections: &[Section], rva: u32) -> Result<usize> {
    sections
        .iter()
        .find_map(|s| {
            let delta = rva.checked_sub(s.virtual_address)?;
            if delta >= s.virtual_size.max(s.raw_size) {
                return None;
            }
            s.raw_pointer.checked_add(delta)
        })
        .map(|offset| offset as usize)
        .ok_or(MetadataError::UnmappedRva(rva))
}

/// Locates the metadata root inside a PE image.
fn metadata_root(image: &[u8]) -> Result<&[u8]> {
    if bytes(image, 0, 2)? != b"MZ" {
        return Err(MetadataError::BadSignature("DOS"));
    }
    let pe = read_u32(image, 0x3C)? as usize;
    if bytes(image, pe, 4)? != b"PE\0\0" {
        return Err(MetadataError::BadSignature("PE"));
    }

    let coff = pe + 4;
    let section_count = read_u16(image, coff + 2)? as usize;
    let optional_size = read_u16(image, coff + 16)? as usize;
    let optional = coff + 20;

    let (rva_count_at, directories_at) = match read_u16(image, optional)? {
        0x10B => (optional + 92, optional + 96),
        0x20B => (optional + 108, optional + 112),
        _ => return Err(MetadataError::BadSignature("optional header")),
    };

    const CLR_DIRECTORY: usize = 14;
    if (read_u32(image, rva_count_at)? as usize) <= CLR_DIRECTORY {
        return Err(MetadataError::NotManaged);
    }
    let clr_rva = read_u32(image, directories_at + CLR_DIRECTORY * 8)?;
    if clr_rva == 0 {
        return Err(MetadataError::NotManaged);
    }

    let section_table = optional + optional_size;
    let sections = (0..section_count)
        .map(|i| {
            let at = section_table + i * 40;
            Ok(Section {
                virtual_size: read_u32(image, at + 8)?,
                virtual_address: read_u32(image, at + 12)?,
                raw_size: read_u32(image, at + 16)?,
                raw_pointer: read_u32(image, at + 20)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cli = rva_to_offset(&sections, clr_rva)?;
    let metadata_rva = read_u32(image, cli + 8)?;
    let metadata_size = read_u32(image, cli + 12)? as usize;
    let root = rva_to_offset(&sections, metadata_rva)?;
    bytes(image, root, metadata_size)
}

/// Row counts and physical layout of the `#~` stream.
struct Tables<'a> {
    data: &'a [u8],
    rows: [u32; 64],
    offsets: [usize; 64],
    row_sizes: [usize; 64],
    wide_strings: bool,
    wide_guids: bool,
    wide_blobs: bool,
}

impl<'a> Tables<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        let heap_sizes = *data.get(6).ok_or(MetadataError::Truncated(6))?;
        let valid = read_u64(data, 8)?;

        let mut rows = [0u32; 64];
        let mut cursor = 24;
        for (id, count) in rows.iter_mut().enumerate() {
            if valid & (1u64 << id) != 0 {
                *count = read_u32(data, cursor)?;
                cursor += 4;
            }
        }
        // Some toolchains emit an extra 4-byte field after the row counts.
        if heap_sizes & 0x40 != 0 {
            cursor += 4;
        }

        let mut tables = Self {
            data,
            rows,
            offsets: [0; 64],
            row_sizes: [0; 64],
            wide_strings: heap_sizes & 0x01 != 0,
            wide_guids: heap_sizes & 0x02 != 0,
            wide_blobs: heap_sizes & 0x04 != 0,
        };

        for id in 0..=table::LAST_KNOWN {
            let size: usize = schema(id).iter().map(|c| tables.col_size(*c)).sum();
            tables.row_sizes[id] = size;
            tables.offsets[id] = cursor;
            cursor += size * tables.rows[id] as usize;
        }

        Ok(tables)
    }

    fn rows(&self, id: usize) -> u32 {
        self.rows[id]
    }

    fn index_size(&self, id: usize) -> usize {
        if self.rows[id] > 0xFFFF {
            4
        } else {
            2
        }
    }

    fn col_size(&self, col: Col) -> usize {
        match col {
            Col::Fixed(n) => n,
            Col::Str => wide(self.wide_strings),
            Col::Guid => wide(self.wide_guids),
            Col::Blob => wide(self.wide_blobs),
            Col::Table(id) => self.index_size(id),
            Col::CodedIndex(coded) => {
                let max_rows = coded
                    .tables()
                    .iter()
                    .filter(|&&t| t != UNUSED)
                    .map(|&t| self.rows[t])
                    .max()
                    .unwrap_or(0);
                if max_rows < (1u32 << (16 - coded.tag_bits())) {
                    2
                } else {
                    4
                }
            }
        }
    }

    /// Reads column `col` of 1-based `row` in table `id`.
    fn cell(&self, id: usize, row: u32, col: usize) -> Result<u32> {
        if row == 0 || row > self.rows[id] {
            return Err(MetadataError::RowOutOfRange { table: id, row });
        }
        let columns = schema(id);
        let within: usize = columns[..col].iter().map(|c| self.col_size(*c)).sum();
        let at = self.offsets[id] + (row as usize - 1) * self.row_sizes[id] + within;
        match self.col_size(columns[col]) {
            2 => read_u16(self.data, at).map(u32::from),
            _ => read_u32(self.data, at),
        }
    }
}

fn wide(flag: bool) -> usize {
    if flag {
        4
    } else {
        2
    }
}

/// A custom attribute attached to a type definition.
#[derive(Debug, Clone)]
pub struct TypeAttribute<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    constructor_signature: &'a [u8],
    value: &'a [u8],
}

const ELEMENT_TYPE_VOID: u8 = 0x01;
const ELEMENT_TYPE_STRING: u8 = 0x0E;
const CALLCONV_GENERIC: u8 = 0x10;

impl TypeAttribute<'_> {
    /// Decodes the first `count` positional arguments when they are all
    /// strings. A null string decodes as empty.
    pub fn leading_string_args(&self, count: usize) -> Option<Vec<String>> {
        let sig = self.constructor_signature;
        let mut pos = 1;
        if sig.first()? & CALLCONV_GENERIC != 0 {
            pos += decompress(sig.get(pos..)?)?.1;
        }
        let (param_count, width) = decompress(sig.get(pos..)?)?;
        pos += width;
        if *sig.get(pos)? != ELEMENT_TYPE_VOID || (param_count as usize) < count {
            return None;
        }
        pos += 1;
        let params = sig.get(pos..pos + count)?;
        if params.iter().any(|&p| p != ELEMENT_TYPE_STRING) {
            return None;
        }

        let value = self.value;
        if value.get(0..2)? != [0x01, 0x00] {
            return None;
        }
        let mut pos = 2;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            if *value.get(pos)? == 0xFF {
                pos += 1;
                args.push(String::new());
                continue;
            }
            let (len, width) = decompress(value.get(pos..)?)?;
            pos += width;
            let raw = value.get(pos..pos + len as usize)?;
            pos += len as usize;
            args.push(String::from_utf8_lossy(raw).into_owned());
        }
        Some(args)
    }
}

/// Parsed view over the metadata of one managed module.
pub struct ModuleMetadata<'a> {
    tables: Tables<'a>,
    strings: &'a [u8],
    blobs: &'a [u8],
}

impl<'a> ModuleMetadata<'a> {
    pub fn parse(image: &'a [u8]) -> Result<Self> {
        let root = metadata_root(image)?;
        if read_u32(root, 0)? != 0x424A_5342 {
            return Err(MetadataError::BadSignature("metadata"));
        }
        let version_len = read_u32(root, 12)? as usize;
        let streams_at = 16 + version_len;
        let stream_count = read_u16(root, streams_at + 2)? as usize;

        let mut streams: HashMap<&str, &'a [u8]> = HashMap::new();
        let mut cursor = streams_at + 4;
        for _ in 0..stream_count {
            let offset = read_u32(root, cursor)? as usize;
            let size = read_u32(root, cursor + 4)? as usize;
            let name_at = cursor + 8;
            let name_len = root
                .get(name_at..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or(MetadataError::Truncated(name_at))?;
            let name = std::str::from_utf8(&root[name_at..name_at + name_len])
                .map_err(|_| MetadataError::BadSignature("stream header"))?;
            streams.insert(name, bytes(root, offset, size)?);
            cursor = name_at + (name_len + 4) / 4 * 4;
        }

        let tables = streams
            .get("#~")
            .or_else(|| streams.get("#-"))
            .copied()
            .ok_or(MetadataError::MissingStream("#~"))?;
        let strings = streams
            .get("#Strings")
            .copied()
            .ok_or(MetadataError::MissingStream("#Strings"))?;
        let blobs = streams.get("#Blob").copied().unwrap_or(&[]);

        Ok(Self {
            tables: Tables::parse(tables)?,
            strings,
            blobs,
        })
    }

    fn string(&self, index: u32) -> Result<&'a str> {
        let start = index as usize;
        let rest = self
            .strings
            .get(start..)
            .ok_or(MetadataError::Truncated(start))?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        std::str::from_utf8(&rest[..end]).map_err(|_| MetadataError::InvalidString(index))
    }

    fn blob(&self, index: u32) -> Result<&'a [u8]> {
        let start = index as usize;
        let rest = self
            .blobs
            .get(start..)
            .ok_or(MetadataError::Truncated(start))?;
        let (len, width) = decompress(rest).ok_or(MetadataError::Truncated(start))?;
        bytes(rest, width, len as usize)
    }

    pub fn type_count(&self) -> u32 {
        self.tables.rows(table::TYPE_DEF)
    }

    /// Type definition rows in declaration order: each top-level type is
    /// followed by its nested types, depth first.
    pub fn types_in_declaration_order(&self) -> Result<Vec<u32>> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut nested = vec![false; self.type_count() as usize + 1];
        for row in 1..=self.tables.rows(table::NESTED_CLASS) {
            let inner = self.tables.cell(table::NESTED_CLASS, row, 0)?;
            let outer = self.tables.cell(table::NESTED_CLASS, row, 1)?;
            if let Some(flag) = nested.get_mut(inner as usize) {
                *flag = true;
            }
            children.entry(outer).or_default().push(inner);
        }

        let mut order = Vec::with_capacity(self.type_count() as usize);
        let mut visited = vec![false; nested.len()];
        let mut stack: Vec<u32> = (1..=self.type_count())
            .rev()
            .filter(|&row| !nested[row as usize])
            .collect();
        while let Some(row) = stack.pop() {
            match visited.get_mut(row as usize) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            order.push(row);
            if let Some(inner) = children.get(&row) {
                stack.extend(inner.iter().rev());
            }
        }
        Ok(order)
    }

    /// Custom attributes per type definition row, in table order.
    pub fn type_attributes(&self) -> Result<HashMap<u32, Vec<TypeAttribute<'a>>>> {
        let mut by_type: HashMap<u32, Vec<TypeAttribute<'a>>> = HashMap::new();
        for row in 1..=self.tables.rows(table::CUSTOM_ATTRIBUTE) {
            let parent = self.tables.cell(table::CUSTOM_ATTRIBUTE, row, 0)?;
            let Some((table::TYPE_DEF, type_row)) = Coded::HasCustomAttribute.decode(parent)
            else {
                continue;
            };
            let ctor = self.tables.cell(table::CUSTOM_ATTRIBUTE, row, 1)?;
            let value = self.tables.cell(table::CUSTOM_ATTRIBUTE, row, 2)?;
            let Some((namespace, name, signature)) = self.constructor(ctor)? else {
                continue;
            };
            by_type.entry(type_row).or_default().push(TypeAttribute {
                namespace,
                name,
                constructor_signature: signature,
                value: self.blob(value)?,
            });
        }
        Ok(by_type)
    }

    /// Resolves a CustomAttributeType value to (namespace, name, ctor signature).
    fn constructor(&self, coded: u32) -> Result<Option<(&'a str, &'a str, &'a [u8])>> {
        match Coded::CustomAttributeType.decode(coded) {
            Some((table::MEMBER_REF, row)) => {
                let parent = self.tables.cell(table::MEMBER_REF, row, 0)?;
                let signature = self.blob(self.tables.cell(table::MEMBER_REF, row, 2)?)?;
                let owner = match Coded::MemberRefParent.decode(parent) {
                    Some((table::TYPE_REF, r)) => Some(self.type_name(table::TYPE_REF, r)?),
                    Some((table::TYPE_DEF, r)) => Some(self.type_name(table::TYPE_DEF, r)?),
                    _ => None,
                };
                Ok(owner.map(|(ns, name)| (ns, name, signature)))
            }
            Some((table::METHOD_DEF, row)) => {
                let signature = self.blob(self.tables.cell(table::METHOD_DEF, row, 4)?)?;
                match self.method_owner(row)? {
                    Some(owner) => {
                        let (ns, name) = self.type_name(table::TYPE_DEF, owner)?;
                        Ok(Some((ns, name, signature)))
                    }
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// (namespace, name) of a TypeDef or TypeRef row; both keep them in columns 1 and 2.
    fn type_name(&self, id: usize, row: u32) -> Result<(&'a str, &'a str)> {
        let name = self.string(self.tables.cell(id, row, 1)?)?;
        let namespace = self.string(self.tables.cell(id, row, 2)?)?;
        Ok((namespace, name))
    }

    /// The type definition whose method list contains `method`.
    fn method_owner(&self, method: u32) -> Result<Option<u32>> {
        let types = self.type_count();
        let method_end = self.tables.rows(table::METHOD_DEF) + 1;
        for row in 1..=types {
            let start = self.tables.cell(table::TYPE_DEF, row, 5)?;
            let end = if row < types {
                self.tables.cell(table::TYPE_DEF, row + 1, 5)?
            } else {
                method_end
            };
            if method >= start && method < end {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}
