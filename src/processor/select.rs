//! Column projection, renaming and reordering.

use crate::consumer::{Downstream, Flow, Producer};
use crate::error::{PipelineError, PipelineResult};
use crate::processor::{Opened, PassThrough, Processor};
use crate::types::{check_width, ColumnRef, Field, Row, Schema};

/// Keeps `columns` in the given order, optionally renaming them.
#[derive(Debug, Clone)]
pub struct Select {
    columns: Vec<ColumnRef>,
    names: Option<Vec<String>>,
}

impl Select {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self {
            columns,
            names: None,
        }
    }

    /// Select `columns` and name them `names` in the output.
    pub fn with_names(columns: Vec<ColumnRef>, names: Vec<String>) -> Self {
        Self {
            columns,
            names: Some(names),
        }
    }
}

impl Processor for Select {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let indices = schema.resolve_all(&self.columns)?;
        let mut fields: Vec<Field> = indices.iter().map(|&i| schema.fields[i].clone()).collect();
        if let Some(names) = &self.names {
            apply_names(&mut fields, names)?;
        }
        Ok(Opened::producer(
            Project {
                width: schema.len(),
                indices,
            },
            Schema::try_new(fields)?,
        ))
    }
}

/// Renames `columns` to `names`; values are untouched.
#[derive(Debug, Clone)]
pub struct Rename {
    columns: Vec<ColumnRef>,
    names: Vec<String>,
}

impl Rename {
    pub fn new(columns: Vec<ColumnRef>, names: Vec<String>) -> Self {
        Self { columns, names }
    }
}

impl Processor for Rename {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let indices = schema.resolve_all(&self.columns)?;
        if indices.len() != self.names.len() {
            return Err(name_count_mismatch(indices.len(), self.names.len()));
        }
        let mut fields = schema.fields.clone();
        for (&idx, name) in indices.iter().zip(&self.names) {
            fields[idx].name = name.clone();
        }
        Ok(Opened::producer(PassThrough, Schema::try_new(fields)?))
    }
}

/// Moves `columns` to position `pos` among the remaining columns (the end when `pos` is at
/// or past it).
#[derive(Debug, Clone)]
pub struct MoveColumns {
    columns: Vec<ColumnRef>,
    pos: usize,
}

impl MoveColumns {
    pub fn new(columns: Vec<ColumnRef>, pos: usize) -> Self {
        Self { columns, pos }
    }
}

impl Processor for MoveColumns {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        if self.pos > schema.len() {
            return Err(PipelineError::schema_mismatch(format!(
                "invalid target position {} for {} columns",
                self.pos,
                schema.len()
            )));
        }
        let moved = schema.resolve_all(&self.columns)?;
        let mut order: Vec<usize> = (0..schema.len()).filter(|i| !moved.contains(i)).collect();
        let at = self.pos.min(order.len());
        order.splice(at..at, moved);
        let output = schema.project(&order)?;
        Ok(Opened::producer(
            Project {
                width: schema.len(),
                indices: order,
            },
            output,
        ))
    }
}

fn apply_names(fields: &mut [Field], names: &[String]) -> PipelineResult<()> {
    if fields.len() != names.len() {
        return Err(name_count_mismatch(fields.len(), names.len()));
    }
    for (field, name) in fields.iter_mut().zip(names) {
        field.name = name.clone();
    }
    Ok(())
}

fn name_count_mismatch(columns: usize, names: usize) -> PipelineError {
    PipelineError::schema_mismatch(format!(
        "{columns} columns but {names} names were given"
    ))
}

/// Rebuilds each row of `width` values from the values at `indices`.
struct Project {
    width: usize,
    indices: Vec<usize>,
}

impl Producer for Project {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        let values = self.indices.iter().map(|&i| row.values()[i].clone()).collect();
        downstream.forward(row.with_values(values))
    }
}
