//! Scene list input
//!
//! Scene ids come from a delimited file with a header row, or from a plain
//! list with one id per line. Delimited files are kept in full so a cleaned
//! copy without the failed scenes can be written after the run.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::InputError;
use crate::state::data::{is_canonical_id, SceneId, SCENE_ID_LEN};

/// Header names recognized as the scene id column (case-insensitive)
const ID_HEADERS: [&str; 6] = [
    "panoid",
    "pano_id",
    "panorama_id",
    "panoramaid",
    "pano id",
    "id",
];

/// Most frequent of `,` `;` `\t` in the header line; ties go to `,`
pub fn detect_delimiter(line: &str) -> u8 {
    let count = |c: char| line.chars().filter(|&x| x == c).count();
    let (commas, semicolons, tabs) = (count(','), count(';'), count('\t'));

    if semicolons > commas && semicolons > tabs {
        b';'
    } else if tabs > commas && tabs > semicolons {
        b'\t'
    } else {
        b','
    }
}

/// Index of the scene id column, or 0 when no header matches
pub fn find_id_column(headers: &StringRecord) -> usize {
    headers
        .iter()
        .position(|header| {
            let header = header.trim().to_lowercase();
            ID_HEADERS.contains(&header.as_str())
        })
        .unwrap_or(0)
}

/// Canonical 22-character prefix of a cell, or the trimmed cell itself
pub fn extract_scene_id(cell: &str) -> &str {
    let cell = cell.trim();
    if is_canonical_id(cell) {
        return cell;
    }
    match cell.get(..SCENE_ID_LEN) {
        Some(prefix) if is_canonical_id(prefix) => prefix,
        _ => cell,
    }
}

/// Delimited table as read from disk
#[derive(Debug, Clone)]
struct Table {
    delimiter: u8,
    headers: StringRecord,
    id_column: usize,
    rows: Vec<StringRecord>,
}

impl Table {
    fn scene_of(&self, row: &StringRecord) -> Option<SceneId> {
        let id = extract_scene_id(row.get(self.id_column)?);
        (!id.is_empty()).then(|| SceneId::from(id))
    }
}

/// Ordered scene ids plus what is needed to rewrite the source file
#[derive(Debug, Clone)]
pub struct SceneList {
    source: PathBuf,
    scenes: Vec<SceneId>,
    table: Option<Table>,
}

impl SceneList {
    /// Read scene ids from `path`
    ///
    /// `.csv` files go through the delimited parser and fall back to line
    /// parsing if that fails. An empty result is an error.
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let content = fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if is_csv {
            match parse_table(&content) {
                Ok(table) => {
                    let scenes: Vec<SceneId> =
                        table.rows.iter().filter_map(|row| table.scene_of(row)).collect();
                    if scenes.is_empty() {
                        return Err(InputError::Empty(path.to_path_buf()));
                    }
                    info!(
                        "Loaded {} scene ids from CSV (column {}, delimiter {:?})",
                        scenes.len(),
                        table.id_column,
                        table.delimiter as char
                    );
                    return Ok(Self {
                        source: path.to_path_buf(),
                        scenes,
                        table: Some(table),
                    });
                }
                Err(err) => {
                    warn!("Error parsing CSV: {}. Falling back to simple line parsing.", err);
                }
            }
        }

        let scenes = parse_lines(&content);
        if scenes.is_empty() {
            return Err(InputError::Empty(path.to_path_buf()));
        }
        info!("Loaded {} scene ids from {}", scenes.len(), path.display());

        Ok(Self {
            source: path.to_path_buf(),
            scenes,
            table: None,
        })
    }

    /// A list holding one scene given directly
    pub fn single(scene: SceneId) -> Self {
        Self {
            source: PathBuf::new(),
            scenes: vec![scene],
            table: None,
        }
    }

    pub fn scenes(&self) -> &[SceneId] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Whether the list came from a delimited file that can be rewritten
    pub fn is_table(&self) -> bool {
        self.table.is_some()
    }

    /// `<stem>_cleaned.csv` next to the input file
    pub fn default_cleaned_path(&self) -> PathBuf {
        let stem = self
            .source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("scenes");
        self.source.with_file_name(format!("{}_cleaned.csv", stem))
    }

    /// Rewrite the input without rows whose scene failed
    ///
    /// Delimited input keeps its header and delimiter. Plain lists are
    /// written one id per line.
    ///
    /// # Returns
    /// * Number of rows written (header excluded)
    pub fn write_cleaned(&self, failed: &[SceneId], path: &Path) -> Result<usize, InputError> {
        let failed: HashSet<&SceneId> = failed.iter().collect();
        let io_error = |source| InputError::Io {
            path: path.to_path_buf(),
            source,
        };

        let Some(table) = &self.table else {
            let kept: Vec<&str> = self
                .scenes
                .iter()
                .filter(|scene| !failed.contains(scene))
                .map(|scene| scene.as_str())
                .collect();
            let mut text = kept.join("\n");
            text.push('\n');
            fs::write(path, text).map_err(io_error)?;
            return Ok(kept.len());
        };

        let mut writer = WriterBuilder::new()
            .delimiter(table.delimiter)
            .flexible(true)
            .from_path(path)?;
        writer.write_record(&table.headers)?;

        let mut written = 0;
        for row in &table.rows {
            let Some(scene) = table.scene_of(row) else {
                continue;
            };
            if failed.contains(&scene) {
                continue;
            }
            writer.write_record(row)?;
            written += 1;
        }
        writer.flush().map_err(io_error)?;

        info!("Wrote cleaned CSV with {} rows to {}", written, path.display());
        Ok(written)
    }
}

fn parse_table(content: &str) -> Result<Table, InputError> {
    let header_line = content.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(header_line);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let rows = reader
        .records()
        .filter(|row| !matches!(row, Ok(record) if record.iter().all(|cell| cell.is_empty())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table {
        delimiter,
        id_column: find_id_column(&headers),
        headers,
        rows,
    })
}

/// One id per line: first field before `,` or `;`, blank lines skipped
fn parse_lines(content: &str) -> Vec<SceneId> {
    content
        .lines()
        .filter_map(|line| {
            let field = line.split([',', ';']).next().unwrap_or_default().trim();
            (!field.is_empty()).then(|| SceneId::from(field))
        })
        .collect()
}
