//! Fixture builders shared by the integration tests.
//!
//! Every fixture is synthesised in-process so the tests do not depend on binary
//! files checked into the repository.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;

use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream, dictionary};
use tempfile::TempDir;

/// Build a ZIP package from `(part name, content)` pairs.
pub fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::<()>::default();
    for (name, content) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A DOCX whose body holds one paragraph per entry of `paragraphs`.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|text| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        W_NS, body
    );
    let core = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
                   xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Campaign Brief</dc:title>
    <dc:creator>CTI Desk</dc:creator>
</cp:coreProperties>"#;

    package(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("word/document.xml", &document),
        ("docProps/core.xml", core),
    ])
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
</Types>"#;

/// A two-sheet workbook.
///
/// `IOCs` uses shared strings, a boolean and a date-formatted serial (45352 is
/// 2024-03-01); `Notes` holds one inline string carrying a TLP marker.
pub fn xlsx() -> Vec<u8> {
    let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>
        <sheet name="IOCs" sheetId="1" r:id="rId1"/>
        <sheet name="Notes" sheetId="2" r:id="rId2"/>
    </sheets>
</workbook>"#;
    let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
    <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;
    let shared_strings = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="6" uniqueCount="6">
    <si><t>type</t></si>
    <si><t>value</t></si>
    <si><t>active</t></si>
    <si><t>ip</t></si>
    <si><t>198.51.100.7</t></si>
    <si><t>seen</t></si>
</sst>"#;
    let styles = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <cellXfs count="2">
        <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
        <xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
    </cellXfs>
</styleSheet>"#;
    let sheet1 = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <sheetData>
        <row r="1">
            <c r="A1" t="s"><v>0</v></c>
            <c r="B1" t="s"><v>1</v></c>
            <c r="C1" t="s"><v>2</v></c>
        </row>
        <row r="2">
            <c r="A2" t="s"><v>3</v></c>
            <c r="B2" t="s"><v>4</v></c>
            <c r="C2" t="b"><v>1</v></c>
        </row>
        <row r="3">
            <c r="A3" t="s"><v>5</v></c>
            <c r="B3" s="1"><v>45352</v></c>
        </row>
    </sheetData>
</worksheet>"#;
    let sheet2 = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <sheetData>
        <row r="1">
            <c r="A1" t="inlineStr"><is><t>TLP:RED internal</t></is></c>
        </row>
    </sheetData>
</worksheet>"#;

    package(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
        ("xl/sharedStrings.xml", shared_strings),
        ("xl/styles.xml", styles),
        ("xl/worksheets/sheet1.xml", sheet1),
        ("xl/worksheets/sheet2.xml", sheet2),
    ])
}

fn pdf_document(page_contents: &[&[u8]]) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for content in page_contents {
        let content_id = document.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let info_id = document.add_object(dictionary! {
        "Title" => Object::string_literal("Weekly Threat Digest"),
        "Author" => Object::string_literal("SOC"),
        "CreationDate" => Object::string_literal("D:20240501083000Z"),
    });
    document.trailer.set("Info", info_id);
    document
}

fn save(mut document: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    document.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF with one page per text entry.
pub fn pdf(pages: &[&str]) -> Vec<u8> {
    let streams: Vec<Vec<u8>> = pages
        .iter()
        .map(|text| format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text).into_bytes())
        .collect();
    let refs: Vec<&[u8]> = streams.iter().map(Vec::as_slice).collect();
    save(pdf_document(&refs))
}

/// A PDF whose trailer references a standard security handler whose password
/// check can never pass.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut document = pdf_document(&[b"BT (secret) Tj ET"]);
    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::string_literal(vec![0x11u8; 32]),
        "U" => Object::string_literal(vec![0x22u8; 32]),
        "P" => -44,
    });
    document.trailer.set("Encrypt", encrypt_id);
    document.trailer.set(
        "ID",
        vec![
            Object::string_literal(vec![0x33u8; 16]),
            Object::string_literal(vec![0x33u8; 16]),
        ],
    );
    save(document)
}

/// A PDF encrypted with the standard security handler (RC4, 128-bit key).
///
/// An empty `user_password` gives a file anyone can open, restricted only by
/// the owner password.
pub fn password_pdf(pages: &[&str], user_password: &str) -> Vec<u8> {
    let streams: Vec<Vec<u8>> = pages
        .iter()
        .map(|text| format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text).into_bytes())
        .collect();
    let refs: Vec<&[u8]> = streams.iter().map(Vec::as_slice).collect();
    let mut document = pdf_document(&refs);
    document.trailer.set(
        "ID",
        vec![
            Object::string_literal(vec![0x44u8; 16]),
            Object::string_literal(vec![0x44u8; 16]),
        ],
    );

    let version = EncryptionVersion::V2 {
        document: &document,
        owner_password: "cti-owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).unwrap();
    document.encrypt(&state).unwrap();
    save(document)
}
