use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::RngCore;
use tracing::{debug, info, warn};

use tablefill_core::{Schema, Table};

use crate::errors::{FillError, GenerationError};
use crate::filter::{FilterOutcome, evaluate_filter};
use crate::generators::{GeneratedValue, GeneratorContext, GeneratorRegistry, Row};
use crate::model::{FillOptions, FillReport, RunState, TableReport, TableState};
use crate::planner::{ColumnPlan, ColumnStrategy, TablePlan, plan_table};
use crate::rng::{Draw, Mt19937};
use crate::sink::PersistenceSink;
use crate::unique::UniqueTracker;

/// Collisions after which a unique column with a listable domain picks among
/// its unused values instead of drawing again.
const UNUSED_PICK_AFTER: u32 = 32;

/// Cooperative skip/abort signals shared with whoever drives the run.
#[derive(Debug, Clone, Default)]
pub struct FillControl {
    skip: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

impl FillControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the table being filled and move on to the next one.
    pub fn skip_current_table(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    /// Stop the whole run before the next row.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Consume a pending skip request.
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    fn clear_skip(&self) {
        self.skip.store(false, Ordering::SeqCst);
    }
}

/// Rows to add to `table` given the rows it already holds.
pub fn target_rows(table: &Table, existing: u64) -> u64 {
    let target = match table.add_lines {
        Some(add) => add,
        None => table.lines.saturating_sub(existing),
    };
    match table.max_lines {
        Some(max) => target.min(max.saturating_sub(existing)),
        None => target,
    }
}

/// Fills the tables of a resolved schema, in order, into a sink.
pub struct Filler<'a> {
    sink: &'a dyn PersistenceSink,
    options: FillOptions,
    control: FillControl,
    registry: GeneratorRegistry,
    report: FillReport,
}

/// Mutable state of the table being filled.
struct TableRun<'p> {
    index: usize,
    plan: &'p TablePlan,
    columns: Vec<String>,
    /// Auto-increment columns continue after these values.
    id_offsets: Vec<u64>,
    /// Foreign-key candidates per column; `None` for generated columns.
    candidates: Vec<Option<Candidates>>,
    pending: Vec<Vec<GeneratedValue>>,
}

#[derive(Debug, Default)]
struct Candidates {
    values: Vec<GeneratedValue>,
    seen: HashSet<String>,
}

impl Candidates {
    fn from_values(values: Vec<GeneratedValue>) -> Self {
        let mut candidates = Self::default();
        for value in values {
            candidates.push(value);
        }
        candidates
    }

    fn push(&mut self, value: GeneratedValue) {
        if let Some(key) = value.to_text()
            && self.seen.insert(key)
        {
            self.values.push(value);
        }
    }
}

impl<'a> Filler<'a> {
    pub fn new(sink: &'a dyn PersistenceSink, options: FillOptions) -> Self {
        let report = FillReport::new(options.seed);
        Self {
            sink,
            options,
            control: FillControl::new(),
            registry: GeneratorRegistry::new(),
            report,
        }
    }

    pub fn with_control(mut self, control: FillControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Handle for signalling this filler from another thread.
    pub fn control(&self) -> FillControl {
        self.control.clone()
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Progress of the current or last run.
    pub fn report(&self) -> &FillReport {
        &self.report
    }

    /// Fill every table of `schema`, which must already be in fill order.
    pub async fn run(&mut self, schema: &Schema) -> Result<FillReport, FillError> {
        self.report = FillReport::new(self.options.seed);
        self.report.tables = schema
            .tables
            .iter()
            .map(|table| TableReport::pending(&table.name))
            .collect();

        info!(
            seed = self.options.seed,
            tables = schema.tables.len(),
            batch_size = self.options.batch_size,
            reset = self.options.reset,
            "fill started"
        );

        match self.fill_all(schema).await {
            Ok(()) => {
                self.report.state = RunState::Done;
                info!(
                    inserted = self.report.inserted_total(),
                    "fill finished"
                );
                Ok(self.report.clone())
            }
            Err(err) => {
                self.report.state = RunState::Failed;
                self.report.error = Some(err.to_string());
                warn!(table = %err.table(), error = %err, "fill failed");
                Err(err)
            }
        }
    }

    async fn fill_all(&mut self, schema: &Schema) -> Result<(), FillError> {
        let mut rng = Mt19937::new(self.options.seed);
        let mut unique = UniqueTracker::new();

        if self.options.reset {
            for table in schema.tables.iter().rev() {
                self.sink
                    .reset_table(&table.name)
                    .await
                    .map_err(|source| FillError::Sink {
                        table: table.name.clone(),
                        source,
                    })?;
                debug!(table = %table.name, "table reset");
            }
        }

        for (index, table) in schema.tables.iter().enumerate() {
            self.fill_table(index, table, schema, &mut rng, &mut unique)
                .await?;
        }
        Ok(())
    }

    async fn fill_table(
        &mut self,
        index: usize,
        table: &Table,
        schema: &Schema,
        rng: &mut dyn RngCore,
        unique: &mut UniqueTracker,
    ) -> Result<(), FillError> {
        let sink = self.sink;
        let name = table.name.as_str();
        let sink_error = |source| FillError::Sink {
            table: name.to_string(),
            source,
        };
        self.control.clear_skip();
        self.report.tables[index].state = TableState::Filling;

        let existing = if self.options.reset {
            0
        } else {
            sink.count_rows(name).await.map_err(sink_error)?
        };
        let target = target_rows(table, existing);
        self.report.tables[index].existing = existing;
        self.report.tables[index].target = target;

        let plan = plan_table(table, &schema.values).map_err(|source| FillError::Plan {
            table: name.to_string(),
            source,
        })?;

        let mut candidates = Vec::with_capacity(plan.columns.len());
        for column in &plan.columns {
            let fetched = match &column.strategy {
                ColumnStrategy::ForeignKey(fk) => {
                    let values = sink
                        .fetch_values(&fk.table, &fk.column, fk.filter.as_deref())
                        .await
                        .map_err(sink_error)?;
                    Some(Candidates::from_values(values))
                }
                ColumnStrategy::Generate { .. } => None,
            };
            candidates.push(fetched);
        }

        if existing > 0 {
            for column in plan.columns.iter().filter(|column| tracks_unique(column)) {
                let values = sink
                    .fetch_values(name, &column.column.name, None)
                    .await
                    .map_err(sink_error)?;
                unique.seed(name, &column.key, &values);
            }
        }

        let mut id_offsets = vec![0; plan.columns.len()];
        if existing > 0 {
            for (position, column) in plan.columns.iter().enumerate() {
                if !column.column.options.auto_increment {
                    continue;
                }
                let max = sink
                    .max_integer(name, &column.column.name)
                    .await
                    .map_err(sink_error)?;
                id_offsets[position] = max.map_or(existing, |max| max.max(0) as u64);
            }
        }

        info!(table = %name, existing, target, "filling table");

        let mut run = TableRun {
            index,
            plan: &plan,
            columns: plan.column_names(),
            id_offsets,
            candidates,
            pending: Vec::with_capacity(self.options.batch_size.min(target as usize)),
        };

        for row_index in 0..target {
            if self.control.is_aborted() {
                warn!(table = %name, row = row_index, "fill aborted");
                return Err(FillError::Aborted {
                    table: name.to_string(),
                });
            }
            if self.control.take_skip() {
                self.flush(&mut run).await?;
                let report = &mut self.report.tables[index];
                report.state = TableState::Skipped;
                info!(table = %name, rows = report.inserted, "table skipped");
                return Ok(());
            }

            let row = self
                .generate_row(table, &mut run, row_index, rng, unique)
                .map_err(|source| FillError::Generation {
                    table: name.to_string(),
                    row: row_index,
                    source,
                })?;
            run.pending.push(row);

            if run.pending.len() >= self.options.batch_size.max(1) {
                self.flush(&mut run).await?;
            }
        }

        self.flush(&mut run).await?;
        let report = &mut self.report.tables[index];
        report.state = TableState::Done;
        info!(
            table = %name,
            rows = report.inserted,
            batches = report.batches,
            "table filled"
        );
        Ok(())
    }

    async fn flush(&mut self, run: &mut TableRun<'_>) -> Result<(), FillError> {
        if run.pending.is_empty() {
            return Ok(());
        }
        let table = &run.plan.table;
        let inserted = self
            .sink
            .insert_batch(table, &run.columns, &run.pending)
            .await
            .map_err(|source| FillError::Sink {
                table: table.clone(),
                source,
            })?;
        let report = &mut self.report.tables[run.index];
        report.inserted += inserted;
        report.batches += 1;
        debug!(table = %table, rows = inserted, batch = report.batches, "batch written");
        run.pending.clear();
        Ok(())
    }

    fn generate_row(
        &self,
        table: &Table,
        run: &mut TableRun<'_>,
        row_index: u64,
        rng: &mut dyn RngCore,
        unique: &mut UniqueTracker,
    ) -> Result<Vec<GeneratedValue>, GenerationError> {
        let plan = run.plan;
        let mut row = Row::new();
        for (position, column) in plan.columns.iter().enumerate() {
            let candidates = run.candidates[position].as_ref();
            let value = self.generate_value(
                table,
                column,
                &row,
                (row_index, run.id_offsets[position]),
                candidates,
                rng,
                unique,
            )?;
            row.insert(column.key.clone(), value);
        }

        for (position, column) in plan.columns.iter().enumerate() {
            let Some(fk) = column.self_reference(&table.name) else {
                continue;
            };
            let Some(value) = row.get(&fk.column.to_lowercase()) else {
                continue;
            };
            let admitted = match fk.filter.as_deref() {
                None => true,
                Some(filter) => evaluate_filter(filter, &row) == FilterOutcome::Matched,
            };
            if admitted && let Some(candidates) = run.candidates[position].as_mut() {
                candidates.push(value.clone());
            }
        }

        Ok(plan
            .columns
            .iter()
            .map(|column| row.get(&column.key).cloned().unwrap_or(GeneratedValue::Null))
            .collect())
    }

    /// Produce one value for `column`, honouring nullability and uniqueness.
    #[allow(clippy::too_many_arguments)]
    fn generate_value(
        &self,
        table: &Table,
        column: &ColumnPlan,
        row: &Row,
        (row_index, id_offset): (u64, u64),
        candidates: Option<&Candidates>,
        rng: &mut dyn RngCore,
        unique: &mut UniqueTracker,
    ) -> Result<GeneratedValue, GenerationError> {
        let options = &column.column.options;
        if options.nullable
            && !options.auto_increment
            && self.options.null_probability > 0.0
            && rng.chance(self.options.null_probability)
        {
            return Ok(GeneratedValue::Null);
        }

        let pool = match &column.strategy {
            ColumnStrategy::Generate { pool, .. } => pool.as_ref(),
            ColumnStrategy::ForeignKey(_) => None,
        };
        let ctx = GeneratorContext {
            table,
            column: &column.column,
            row,
            row_index,
            id_offset,
            base_date: self.options.base_date,
            pool,
        };

        if !tracks_unique(column) {
            return self.draw(column, &ctx, candidates, rng);
        }

        if let Some(domain) = column.domain_size()
            && unique.len(&table.name, &column.key) as u64 >= domain
        {
            return Err(GenerationError::UniqueExhausted {
                column: column.column.name.clone(),
                domain,
            });
        }

        let mut attempts = 0;
        loop {
            let value = self.draw(column, &ctx, candidates, rng)?;
            if unique.insert(&table.name, &column.key, &value) {
                return Ok(value);
            }
            attempts += 1;
            if attempts >= UNUSED_PICK_AFTER.min(self.options.max_unique_attempts)
                && let Some(listed) = listed_domain(column, candidates)
            {
                let domain = column.domain_size().unwrap_or(listed.len() as u64);
                let unused: Vec<GeneratedValue> = listed
                    .into_iter()
                    .filter(|value| !unique.contains(&table.name, &column.key, value))
                    .collect();
                if unused.is_empty() {
                    return Err(GenerationError::UniqueExhausted {
                        column: column.column.name.clone(),
                        domain,
                    });
                }
                let value = unused[rng.index(unused.len())].clone();
                unique.insert(&table.name, &column.key, &value);
                return Ok(value);
            }
            if attempts >= self.options.max_unique_attempts {
                return Err(GenerationError::UniqueCollisions {
                    column: column.column.name.clone(),
                    attempts,
                });
            }
        }
    }

    fn draw(
        &self,
        column: &ColumnPlan,
        ctx: &GeneratorContext<'_>,
        candidates: Option<&Candidates>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        match &column.strategy {
            ColumnStrategy::ForeignKey(fk) => {
                let values = candidates.map(|c| c.values.as_slice()).unwrap_or_default();
                if values.is_empty() {
                    if column.column.options.nullable {
                        return Ok(GeneratedValue::Null);
                    }
                    return Err(GenerationError::NoForeignCandidates {
                        column: column.column.name.clone(),
                        target: format!("{}.{}", fk.table, fk.column),
                    });
                }
                Ok(values[rng.index(values.len())].clone())
            }
            ColumnStrategy::Generate { kind, .. } => self.registry.generate(*kind, ctx, rng),
        }
    }
}

/// Every value a unique column may take, when it can be listed: the
/// candidates of a foreign key or a small generated domain.
fn listed_domain(
    column: &ColumnPlan,
    candidates: Option<&Candidates>,
) -> Option<Vec<GeneratedValue>> {
    match &column.strategy {
        ColumnStrategy::ForeignKey(_) => candidates.map(|candidates| candidates.values.clone()),
        ColumnStrategy::Generate { .. } => column.domain_values(),
    }
}

/// Unique columns whose values are checked against the tracker.
fn tracks_unique(column: &ColumnPlan) -> bool {
    column.column.options.unique && !column.column.options.auto_increment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_prefers_add_lines_and_caps_at_max() {
        let mut table = Table::new("users", 10);
        assert_eq!(target_rows(&table, 4), 6);
        assert_eq!(target_rows(&table, 12), 0);

        table.add_lines = Some(5);
        assert_eq!(target_rows(&table, 12), 5);

        table.max_lines = Some(14);
        assert_eq!(target_rows(&table, 12), 2);
        assert_eq!(target_rows(&table, 20), 0);
    }

    #[test]
    fn skip_is_consumed_once() {
        let control = FillControl::new();
        let shared = control.clone();
        assert!(!control.take_skip());
        shared.skip_current_table();
        assert!(control.take_skip());
        assert!(!control.take_skip());
        assert!(!control.is_aborted());
        shared.abort();
        assert!(control.is_aborted());
    }
}
