//! Sitemap writing: capacity-bounded XML data files plus an index.
//!
//! Entries stream in one at a time and are buffered up to the configured
//! per-file capacity. A full buffer is serialized as a sitemaps.org
//! `<urlset>` document, optionally gzip-compressed, and written to a
//! sequentially numbered file. `finish` flushes the final partial file
//! and emits a `<sitemapindex>` naming every data file.
//!
//! Every file lands via a temporary path in the output directory and a
//! rename, so a crashed or failed write never leaves a truncated file
//! visible under its final name.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer as XmlWriter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use smg_common::config::SitemapConfig;

use crate::error::{Error, Result};
use crate::types::SitemapEntry;

/// Namespace required on `<urlset>` and `<sitemapindex>` roots
pub const SITEMAP_XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// W3C datetime form used for every `<lastmod>` value
const LASTMOD_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Streaming writer for one source's sitemap files
pub struct SitemapWriter {
    output_dir: PathBuf,
    base_url: String,
    source: String,
    max_per_file: usize,
    compress: bool,
    buffer: Vec<SitemapEntry>,
    produced: Vec<PathBuf>,
    file_counter: u32,
    finished: bool,
}

impl SitemapWriter {
    /// Create a writer for one source, creating the output directory
    pub fn new(config: &SitemapConfig, source: &str) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;

        Ok(Self {
            output_dir: config.output_dir.clone(),
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            source: source.to_string(),
            max_per_file: config.max_urls_per_file,
            compress: config.compress,
            buffer: Vec::new(),
            produced: Vec::new(),
            file_counter: 0,
            finished: false,
        })
    }

    /// Append one entry, flushing a full buffer to disk.
    ///
    /// Must not be called after [`finish`](Self::finish).
    pub fn append(&mut self, entry: SitemapEntry) -> Result<()> {
        debug_assert!(!self.finished, "append after finish");

        self.buffer.push(entry);
        if self.buffer.len() >= self.max_per_file {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Flush the remaining buffer, write the index, and return every
    /// produced path in write order with the index last.
    ///
    /// Idempotent: a second call returns the same list without touching
    /// the filesystem.
    pub fn finish(&mut self) -> Result<Vec<PathBuf>> {
        if self.finished {
            return Ok(self.produced.clone());
        }

        self.flush_buffer()?;

        let data_files = self.produced.clone();
        let index = self.write_index(&data_files)?;
        self.produced.push(index);
        self.finished = true;

        info!(
            source = %self.source,
            files = self.produced.len(),
            "Sitemap output finalized"
        );
        Ok(self.produced.clone())
    }

    /// Paths written so far, in write order.
    ///
    /// Lets a caller report files already on disk when `finish` fails.
    pub fn produced(&self) -> &[PathBuf] {
        &self.produced
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.file_counter += 1;
        let filename = self.data_file_name(self.file_counter);
        let xml = render_urlset(&self.buffer)?;
        let path = self.write_atomic(&filename, &xml, self.compress)?;

        debug!(
            source = %self.source,
            file = %path.display(),
            entries = self.buffer.len(),
            bytes = xml.len(),
            "Wrote sitemap file"
        );

        self.produced.push(path);
        self.buffer.clear();
        Ok(())
    }

    fn write_index(&self, data_files: &[PathBuf]) -> Result<PathBuf> {
        let xml = render_index(&self.base_url, data_files, Utc::now())?;
        let path = self.write_atomic(&self.index_file_name(), &xml, false)?;

        info!(
            source = %self.source,
            file = %path.display(),
            sitemaps = data_files.len(),
            "Wrote sitemap index"
        );
        Ok(path)
    }

    /// Write bytes to a temporary file in the output directory and
    /// rename it into place. The temporary is removed on failure.
    fn write_atomic(&self, filename: &str, xml: &[u8], compress: bool) -> Result<PathBuf> {
        let final_path = self.output_dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.output_dir)?;

        if compress {
            let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
            encoder.write_all(xml)?;
            encoder.finish()?;
        } else {
            tmp.write_all(xml)?;
        }

        tmp.persist(&final_path).map_err(|e| Error::Io(e.error))?;
        Ok(final_path)
    }

    fn data_file_name(&self, number: u32) -> String {
        let ext = if self.compress { ".xml.gz" } else { ".xml" };
        format!("sitemap-{}-{:04}{}", self.source, number, ext)
    }

    fn index_file_name(&self) -> String {
        format!("sitemap-{}-index.xml", self.source)
    }
}

// ============================================================================
// XML rendering
// ============================================================================

fn render_urlset(entries: &[SitemapEntry]) -> Result<Vec<u8>> {
    let mut writer = XmlWriter::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_XMLNS));
    writer.write_event(Event::Start(urlset)).map_err(xml_err)?;

    for entry in entries {
        writer
            .write_event(Event::Start(BytesStart::new("url")))
            .map_err(xml_err)?;

        write_text_element(&mut writer, "loc", &entry.loc)?;
        if let Some(ts) = entry.lastmod {
            write_text_element(&mut writer, "lastmod", &format_lastmod(ts))?;
        }
        write_text_element(&mut writer, "changefreq", entry.changefreq.as_str())?;

        writer
            .write_event(Event::End(BytesEnd::new("url")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("urlset")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn render_index(
    base_url: &str,
    files: &[PathBuf],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let mut writer = XmlWriter::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("sitemapindex");
    root.push_attribute(("xmlns", SITEMAP_XMLNS));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    let lastmod = format_lastmod(generated_at);
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::xml(format!("Unrepresentable file name: {}", file.display())))?;

        writer
            .write_event(Event::Start(BytesStart::new("sitemap")))
            .map_err(xml_err)?;
        write_text_element(&mut writer, "loc", &format!("{}/{}", base_url, name))?;
        write_text_element(&mut writer, "lastmod", &lastmod)?;
        writer
            .write_event(Event::End(BytesEnd::new("sitemap")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("sitemapindex")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_text_element(writer: &mut XmlWriter<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_err)?;
    Ok(())
}

fn format_lastmod(ts: DateTime<Utc>) -> String {
    ts.format(LASTMOD_FORMAT).to_string()
}

fn xml_err(e: impl std::fmt::Display) -> Error {
    Error::xml(e.to_string())
}
