use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::overlay::domain::overlay::{Color, Overlay, OverlayShape, LABEL_COLOR};
use crate::overlay::domain::overlay_sink::OverlaySink;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Record<'a> {
    #[serde(rename_all = "camelCase")]
    Overlay {
        frame_index: Option<usize>,
        shapes: &'a [OverlayShape],
    },
    Label {
        text: &'a str,
        color: Color,
    },
}

/// Writes one JSON document per update, newline separated.
pub struct JsonLinesOverlaySink<W: Write + Send> {
    writer: W,
    records: usize,
}

impl JsonLinesOverlaySink<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> JsonLinesOverlaySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, record: &Record<'_>) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        match result {
            Ok(()) => self.records += 1,
            Err(e) => log::warn!("Failed to write overlay record: {e}"),
        }
    }
}

impl<W: Write + Send> OverlaySink for JsonLinesOverlaySink<W> {
    fn present(&mut self, overlay: &Overlay) {
        self.write(&Record::Overlay {
            frame_index: overlay.frame_index,
            shapes: &overlay.shapes,
        });
    }

    fn set_label(&mut self, text: &str) {
        self.write(&Record::Label {
            text,
            color: LABEL_COLOR,
        });
    }

    fn dispose(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("Failed to flush overlay records: {e}");
        }
    }
}
