//! DOCX serializer.
//!
//! # Responsibility
//! - Size the numbering definitions to the forest: one level style per
//!   depth from 0 to the deepest item, for both list types.
//! - Emit one list paragraph per item, short notes as an italic run, long
//!   notes as comment and block-quotation paragraphs.
//! - Package the WordprocessingML parts into a zip container.
//!
//! # Invariants
//! - Every ordered sibling list gets its own numbering instance so its
//!   count restarts at 1; unordered lists share one instance.
//! - Output depends only on the project; timestamps come from the project.

use super::markup::{self, Block, Span};
use super::{
    bullet_glyph, document_order, item_label, joined_short_notes, ExportArtifact, ExportError,
    ExportFormat, NumberFormat,
};
use crate::model::item::{Item, ListType};
use crate::model::project::Project;
use crate::outline::tree::max_depth;
use log::info;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_WORD: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";

const BASE_INDENT_TWIPS: u32 = 360;
const INDENT_STEP_TWIPS: u32 = 360;
const HANGING_TWIPS: u32 = 180;
const TITLE_SPACING_TWIPS: &str = "300";
const NOTE_SPACING_TWIPS: &str = "100";
const NOTE_COLOR: &str = "666666";

const BULLET_ABSTRACT_ID: u32 = 0;
const ORDERED_ABSTRACT_ID: u32 = 1;
const BULLET_NUM_ID: u32 = 1;

/// Style of one numbering level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStyle {
    pub level: usize,
    pub format: NumberFormat,
    /// `w:lvlText` value: a glyph, or `%N.` for ordered levels.
    pub text: String,
    pub left_twips: u32,
    pub hanging_twips: u32,
}

/// Per-depth level styles for both list types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingPlan {
    pub bullet: Vec<LevelStyle>,
    pub ordered: Vec<LevelStyle>,
}

/// Builds level styles for depths `0..=max_depth`.
pub fn numbering_plan(max_depth: usize) -> NumberingPlan {
    let mut bullet = Vec::with_capacity(max_depth + 1);
    let mut ordered = Vec::with_capacity(max_depth + 1);
    for level in 0..=max_depth {
        let left_twips = level_indent(level);
        bullet.push(LevelStyle {
            level,
            format: NumberFormat::Bullet,
            text: bullet_glyph(level).to_string(),
            left_twips,
            hanging_twips: HANGING_TWIPS,
        });
        ordered.push(LevelStyle {
            level,
            format: NumberFormat::ordered_at(level),
            text: format!("%{}.", level + 1),
            left_twips,
            hanging_twips: HANGING_TWIPS,
        });
    }
    NumberingPlan { bullet, ordered }
}

fn level_indent(level: usize) -> u32 {
    let level = u32::try_from(level).unwrap_or(u32::MAX / INDENT_STEP_TWIPS);
    BASE_INDENT_TWIPS.saturating_add(level.saturating_mul(INDENT_STEP_TWIPS))
}

/// Renders `project` as a DOCX package.
pub fn export_docx(project: &Project) -> Result<ExportArtifact, ExportError> {
    let depth = max_depth(&project.lists);
    let plan = numbering_plan(depth);
    let instances = NumberingInstances::assign(project);

    let parts: [(&str, Vec<u8>); 7] = [
        ("[Content_Types].xml", content_types_xml()?),
        ("_rels/.rels", package_rels_xml()?),
        ("word/_rels/document.xml.rels", document_rels_xml()?),
        ("docProps/core.xml", core_xml(project)?),
        ("word/styles.xml", styles_xml(project)?),
        ("word/numbering.xml", numbering_xml(&plan, &instances)?),
        ("word/document.xml", document_xml(project, &instances)?),
    ];

    let mut package = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in parts {
        package.start_file(name, part_options())?;
        package.write_all(&bytes)?;
    }
    let bytes = package.finish()?.into_inner();

    info!(
        "event=export_docx module=export status=ok project_id={} max_depth={} bytes={}",
        project.id,
        depth,
        bytes.len()
    );
    Ok(ExportArtifact::new(&project.name, ExportFormat::Docx, bytes))
}

fn part_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Numbering instance ids keyed by sibling list.
struct NumberingInstances<'a> {
    /// Ordered sibling lists: owner id (`None` for roots) to num id.
    ordered: HashMap<Option<&'a str>, u32>,
    /// `(num id, level)` in assignment order.
    restarts: Vec<(u32, usize)>,
}

impl<'a> NumberingInstances<'a> {
    fn assign(project: &'a Project) -> Self {
        let mut ordered = HashMap::new();
        let mut restarts = Vec::new();
        let mut next_id = BULLET_NUM_ID + 1;
        for entry in document_order(project) {
            if entry.list_type != ListType::Ordered {
                continue;
            }
            let key = entry.parent.map(|parent| parent.id.as_str());
            ordered.entry(key).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                restarts.push((id, entry.depth));
                id
            });
        }
        Self { ordered, restarts }
    }

    fn num_id(&self, parent: Option<&Item>, list_type: ListType) -> u32 {
        match list_type {
            ListType::Unordered => BULLET_NUM_ID,
            ListType::Ordered => self
                .ordered
                .get(&parent.map(|item| item.id.as_str()))
                .copied()
                .unwrap_or(BULLET_NUM_ID),
        }
    }
}

/// Thin event writer for one XML part.
struct Part {
    writer: Writer<Vec<u8>>,
}

impl Part {
    fn new() -> Result<Self, ExportError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { writer })
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), ExportError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ExportError> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<name attrs>text</name>`.
    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), ExportError> {
        self.open(name, attrs)?;
        self.text(text)?;
        self.close(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn content_types_xml() -> Result<Vec<u8>, ExportError> {
    let mut part = Part::new()?;
    part.open("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    part.empty(
        "Default",
        &[
            ("Extension", "rels"),
            ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
        ],
    )?;
    part.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    let overrides = [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/word/numbering.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
    ];
    for (part_name, content_type) in overrides {
        part.empty("Override", &[("PartName", part_name), ("ContentType", content_type)])?;
    }
    part.close("Types")?;
    Ok(part.finish())
}

fn relationships_xml(rels: &[(&str, &str, &str)]) -> Result<Vec<u8>, ExportError> {
    let mut part = Part::new()?;
    part.open("Relationships", &[("xmlns", NS_PACKAGE_REL)])?;
    for &(id, kind, target) in rels {
        part.empty("Relationship", &[("Id", id), ("Type", kind), ("Target", target)])?;
    }
    part.close("Relationships")?;
    Ok(part.finish())
}

fn package_rels_xml() -> Result<Vec<u8>, ExportError> {
    relationships_xml(&[
        ("rId1", REL_OFFICE_DOCUMENT, "word/document.xml"),
        ("rId2", REL_CORE_PROPERTIES, "docProps/core.xml"),
    ])
}

fn document_rels_xml() -> Result<Vec<u8>, ExportError> {
    relationships_xml(&[
        ("rId1", REL_STYLES, "styles.xml"),
        ("rId2", REL_NUMBERING, "numbering.xml"),
    ])
}

fn core_xml(project: &Project) -> Result<Vec<u8>, ExportError> {
    let created = project.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let modified = project.updated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut part = Part::new()?;
    part.open(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    part.leaf("dc:title", &[], &project.name)?;
    part.leaf("dc:creator", &[], super::json::APPLICATION_TAG)?;
    part.leaf("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], &created)?;
    part.leaf("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], &modified)?;
    part.close("cp:coreProperties")?;
    Ok(part.finish())
}

fn styles_xml(project: &Project) -> Result<Vec<u8>, ExportError> {
    let body_size = project.settings.font_size.saturating_mul(2).to_string();
    let mut part = Part::new()?;
    part.open("w:styles", &[("xmlns:w", NS_WORD)])?;

    part.open("w:docDefaults", &[])?;
    part.open("w:rPrDefault", &[])?;
    part.open("w:rPr", &[])?;
    part.empty("w:sz", &[("w:val", body_size.as_str())])?;
    part.close("w:rPr")?;
    part.close("w:rPrDefault")?;
    part.close("w:docDefaults")?;

    paragraph_style(&mut part, "Normal", "Normal", None, |_| Ok(()))?;
    paragraph_style(&mut part, "Title", "Title", Some("Normal"), |part| {
        part.empty("w:b", &[])?;
        part.empty("w:sz", &[("w:val", "48")])
    })?;
    paragraph_style(&mut part, "ListParagraph", "List Paragraph", Some("Normal"), |_| Ok(()))?;
    paragraph_style(&mut part, "Comment", "Comment", Some("Normal"), |part| {
        part.empty("w:color", &[("w:val", NOTE_COLOR)])
    })?;
    paragraph_style(&mut part, "BlockQuotation", "Block Quotation", Some("Normal"), |part| {
        part.empty("w:i", &[])?;
        part.empty("w:color", &[("w:val", NOTE_COLOR)])
    })?;

    part.close("w:styles")?;
    Ok(part.finish())
}

fn paragraph_style(
    part: &mut Part,
    id: &str,
    name: &str,
    based_on: Option<&str>,
    run_props: impl FnOnce(&mut Part) -> Result<(), ExportError>,
) -> Result<(), ExportError> {
    part.open("w:style", &[("w:type", "paragraph"), ("w:styleId", id)])?;
    part.empty("w:name", &[("w:val", name)])?;
    if let Some(base) = based_on {
        part.empty("w:basedOn", &[("w:val", base)])?;
    }
    part.open("w:rPr", &[])?;
    run_props(part)?;
    part.close("w:rPr")?;
    part.close("w:style")
}

fn numbering_xml(plan: &NumberingPlan, instances: &NumberingInstances<'_>) -> Result<Vec<u8>, ExportError> {
    let mut part = Part::new()?;
    part.open("w:numbering", &[("xmlns:w", NS_WORD)])?;
    abstract_num(&mut part, BULLET_ABSTRACT_ID, &plan.bullet)?;
    abstract_num(&mut part, ORDERED_ABSTRACT_ID, &plan.ordered)?;

    let bullet_id = BULLET_NUM_ID.to_string();
    let bullet_abstract = BULLET_ABSTRACT_ID.to_string();
    part.open("w:num", &[("w:numId", bullet_id.as_str())])?;
    part.empty("w:abstractNumId", &[("w:val", bullet_abstract.as_str())])?;
    part.close("w:num")?;

    let ordered_abstract = ORDERED_ABSTRACT_ID.to_string();
    for (num_id, level) in &instances.restarts {
        let num_id = num_id.to_string();
        let level = level.to_string();
        part.open("w:num", &[("w:numId", num_id.as_str())])?;
        part.empty("w:abstractNumId", &[("w:val", ordered_abstract.as_str())])?;
        part.open("w:lvlOverride", &[("w:ilvl", level.as_str())])?;
        part.empty("w:startOverride", &[("w:val", "1")])?;
        part.close("w:lvlOverride")?;
        part.close("w:num")?;
    }

    part.close("w:numbering")?;
    Ok(part.finish())
}

fn abstract_num(part: &mut Part, id: u32, levels: &[LevelStyle]) -> Result<(), ExportError> {
    let id = id.to_string();
    part.open("w:abstractNum", &[("w:abstractNumId", id.as_str())])?;
    part.empty("w:multiLevelType", &[("w:val", "hybridMultilevel")])?;
    for style in levels {
        let level = style.level.to_string();
        let left = style.left_twips.to_string();
        let hanging = style.hanging_twips.to_string();
        part.open("w:lvl", &[("w:ilvl", level.as_str())])?;
        part.empty("w:start", &[("w:val", "1")])?;
        part.empty("w:numFmt", &[("w:val", style.format.word_name())])?;
        part.empty("w:lvlText", &[("w:val", style.text.as_str())])?;
        part.empty("w:lvlJc", &[("w:val", "left")])?;
        part.open("w:pPr", &[])?;
        part.empty("w:ind", &[("w:left", left.as_str()), ("w:hanging", hanging.as_str())])?;
        part.close("w:pPr")?;
        part.close("w:lvl")?;
    }
    part.close("w:abstractNum")
}

fn document_xml(project: &Project, instances: &NumberingInstances<'_>) -> Result<Vec<u8>, ExportError> {
    let mut part = Part::new()?;
    part.open("w:document", &[("xmlns:w", NS_WORD), ("xmlns:r", NS_REL)])?;
    part.open("w:body", &[])?;

    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty("w:pStyle", &[("w:val", "Title")])?;
    part.empty("w:spacing", &[("w:after", TITLE_SPACING_TWIPS)])?;
    part.close("w:pPr")?;
    run(&mut part, &project.name, RunStyle::default())?;
    part.close("w:p")?;

    for entry in document_order(project) {
        let level = entry.depth.to_string();
        let num_id = instances.num_id(entry.parent, entry.list_type).to_string();
        part.open("w:p", &[])?;
        part.open("w:pPr", &[])?;
        part.empty("w:pStyle", &[("w:val", "ListParagraph")])?;
        part.open("w:numPr", &[])?;
        part.empty("w:ilvl", &[("w:val", level.as_str())])?;
        part.empty("w:numId", &[("w:val", num_id.as_str())])?;
        part.close("w:numPr")?;
        part.close("w:pPr")?;
        run(&mut part, item_label(entry.item), RunStyle::default())?;
        if let Some(notes) = joined_short_notes(entry.item) {
            let italic = RunStyle {
                italic: true,
                ..RunStyle::default()
            };
            run(&mut part, &format!(" ({notes})"), italic)?;
        }
        part.close("w:p")?;

        for note in &entry.item.long_notes {
            for block in markup::parse(&note.text) {
                long_note_paragraph(&mut part, &block, entry.depth)?;
            }
        }
    }

    part.open("w:sectPr", &[])?;
    part.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
    part.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
        ],
    )?;
    part.close("w:sectPr")?;
    part.close("w:body")?;
    part.close("w:document")?;
    Ok(part.finish())
}

fn long_note_paragraph(part: &mut Part, block: &Block, depth: usize) -> Result<(), ExportError> {
    let (style, level) = match block {
        Block::Paragraph(_) => ("Comment", depth + 1),
        Block::Quote(_) => ("BlockQuotation", depth + 2),
    };
    let left = level_indent(level).to_string();
    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty("w:pStyle", &[("w:val", style)])?;
    part.empty(
        "w:spacing",
        &[("w:before", NOTE_SPACING_TWIPS), ("w:after", NOTE_SPACING_TWIPS)],
    )?;
    part.empty("w:ind", &[("w:left", left.as_str())])?;
    part.close("w:pPr")?;
    for span in block.spans() {
        match span {
            Span::LineBreak => {
                part.open("w:r", &[])?;
                part.empty("w:br", &[])?;
                part.close("w:r")?;
            }
            Span::Text { text, bold, italic } => {
                let style = RunStyle {
                    bold: *bold,
                    italic: *italic,
                    color: Some(NOTE_COLOR),
                };
                run(part, text, style)?;
            }
        }
    }
    part.close("w:p")
}

#[derive(Debug, Clone, Copy, Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
    color: Option<&'static str>,
}

fn run(part: &mut Part, text: &str, style: RunStyle) -> Result<(), ExportError> {
    part.open("w:r", &[])?;
    if style.bold || style.italic || style.color.is_some() {
        part.open("w:rPr", &[])?;
        if style.bold {
            part.empty("w:b", &[])?;
        }
        if style.italic {
            part.empty("w:i", &[])?;
        }
        if let Some(color) = style.color {
            part.empty("w:color", &[("w:val", color)])?;
        }
        part.close("w:rPr")?;
    }
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        part.leaf("w:t", &[("xml:space", "preserve")], text)?;
    } else {
        part.leaf("w:t", &[], text)?;
    }
    part.close("w:r")
}
