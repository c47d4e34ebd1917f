use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::path::Path;

pub const CREDENTIAL_CELL_OLD: &str = "API_KEY = \"<insert your API key>\"\nstudio = Studio(API_KEY)";
pub const CREDENTIAL_CELL_NEW: &str = "import os\nAPI_KEY = os.getenv(\"CLEANLAB_API_KEY\")";

const PARAMETERS_TAG: &str = "parameters";
const INJECTED_TAG: &str = "injected-parameters";

/// An nbformat v4 document. Fields other than `cells` are kept as-is.
#[derive(Debug, Clone)]
pub struct Notebook {
    fields: Map<String, Value>,
    cells: Vec<Value>,
}

impl Notebook {
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text).context("Notebook is not valid JSON")?;
        let Value::Object(mut fields) = doc else {
            anyhow::bail!("Notebook is not a JSON object");
        };
        let Some(Value::Array(cells)) = fields.remove("cells") else {
            anyhow::bail!("Notebook has no 'cells' array");
        };
        Ok(Self { fields, cells })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read notebook {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        let mut doc = self.fields.clone();
        doc.insert("cells".to_string(), Value::Array(self.cells.clone()));
        let mut text = serde_json::to_string_pretty(&Value::Object(doc))?;
        text.push('\n');
        Ok(text)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write notebook {}", path.display()))
    }

    pub fn code_sources(&self) -> Vec<String> {
        self.cells
            .iter()
            .filter(|c| is_code_cell(c))
            .map(cell_source)
            .collect()
    }

    /// Rewrites the first code cell containing `old`. Returns whether it matched.
    pub fn replace_code(&mut self, old: &str, new: &str) -> bool {
        let Some(cell) = self
            .cells
            .iter_mut()
            .find(|c| is_code_cell(c) && cell_source(c).contains(old))
        else {
            return false;
        };

        let replaced = cell_source(cell).replace(old, new);
        set_cell_source(cell, &replaced);
        true
    }

    /// Adds an `injected-parameters` cell after the `parameters` cell, or first.
    pub fn inject_parameters(&mut self, params: &[(String, String)]) {
        let source = params
            .iter()
            .map(|(name, value)| format!("{} = {}", name, python_string_literal(value)))
            .collect::<Vec<_>>()
            .join("\n");

        let cell = json!({
            "cell_type": "code",
            "execution_count": null,
            "metadata": { "tags": [INJECTED_TAG] },
            "outputs": [],
            "source": source,
        });

        let cells = &mut self.cells;
        cells.retain(|c| !has_tag(c, INJECTED_TAG));

        let position = cells
            .iter()
            .position(|c| has_tag(c, PARAMETERS_TAG))
            .map_or(0, |idx| idx + 1);
        cells.insert(position, cell);
    }
}

fn is_code_cell(cell: &Value) -> bool {
    cell.get("cell_type").and_then(Value::as_str) == Some("code")
}

fn has_tag(cell: &Value, tag: &str) -> bool {
    cell.pointer("/metadata/tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
}

fn cell_source(cell: &Value) -> String {
    match cell.get("source") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(lines)) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Writes `source` back in the shape the cell already used.
fn set_cell_source(cell: &mut Value, source: &str) {
    let as_lines = matches!(cell.get("source"), Some(Value::Array(_)));
    let value = if as_lines {
        Value::Array(
            source
                .split_inclusive('\n')
                .map(|l| Value::String(l.to_string()))
                .collect(),
        )
    } else {
        Value::String(source.to_string())
    };

    if let Value::Object(map) = cell {
        map.insert("source".to_string(), value);
    } else {
        let mut map = Map::new();
        map.insert("source".to_string(), value);
        *cell = Value::Object(map);
    }
}

fn python_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Patches the notebook at `path` in place; the file is only rewritten on a match.
pub fn replace_code(path: &Path, old: &str, new: &str) -> Result<bool> {
    let mut notebook = Notebook::read(path)?;
    let changed = notebook.replace_code(old, new);
    if changed {
        notebook.write(path)?;
    }
    Ok(changed)
}

/// Writes a copy of `input` with `params` injected to `output`.
pub fn inject_parameters(input: &Path, output: &Path, params: &[(String, String)]) -> Result<()> {
    let mut notebook = Notebook::read(input)?;
    notebook.inject_parameters(params);
    notebook.write(output)
}
