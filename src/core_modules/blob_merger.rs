// THEORY:
// The `PartArena` is the engine of the spatial grouping layer. It turns the flat,
// row-ordered list of scanline runs into connected components without ever
// touching individual pixels.
//
// Key architectural principles:
// 1.  **Row Sweep**: Runs are consumed one row at a time. The runs of the previous
//     row, each tagged with the part that owns it, form the "open" frontier. A run
//     of the current row joins every frontier part it overlaps (4-connectivity)
//     and whose value it shares.
// 2.  **Arena Ownership**: Parts live in a single `Vec` and refer to each other by
//     `PartId`. When a run bridges several parts, the largest one survives and the
//     others are recorded as its children. Nothing is copied and nothing is freed
//     individually; the arena is cleared as a whole at the start of the next pass.
// 3.  **Atomic Multi-way Merge**: All parts matched by one run are merged in a
//     single step, with the survivor chosen by size (ties go to the oldest part).
//     The flattened result does not depend on the order the matches were found in.
// 4.  **Closing**: A part that receives no run in a row can never grow again. It is
//     closed at the end of that row and becomes a finished blob.
// 5.  **Iterative Flattening**: Collecting a finished blob's runs walks its child
//     tree with an explicit stack, so very deep merge chains cannot overflow the
//     call stack.

use crate::core_modules::scanline::ScanlineRun;
use log::trace;

/// Handle of a part inside a `PartArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(u32);

impl PartId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct PartRecord {
    value: u8,
    /// Indices into the frame's run list owned directly by this part.
    runs: Vec<u32>,
    /// Parts absorbed into this one.
    children: Vec<PartId>,
    /// Set once this part has been absorbed.
    parent: Option<PartId>,
    pixel_count: u64,
    /// Smallest run index in the whole subtree; orders finished blobs.
    first_run: u32,
    last_row: u32,
    closed: bool,
}

/// Arena of blob parts for one merge pass.
#[derive(Debug, Default)]
pub struct PartArena {
    parts: Vec<PartRecord>,
    finished: Vec<PartId>,
    /// (run index, owning part) for the previous row.
    frontier: Vec<(u32, PartId)>,
    /// (run index, owning part) for the row being processed.
    current: Vec<(u32, PartId)>,
    matched: Vec<PartId>,
    stack: Vec<PartId>,
}

impl PartArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every part. Scratch capacity is kept for the next pass.
    pub fn clear(&mut self) {
        self.parts.clear();
        self.finished.clear();
        self.frontier.clear();
        self.current.clear();
        self.matched.clear();
        self.stack.clear();
    }

    /// Total number of parts created in this pass, absorbed ones included.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Finished blobs, ordered by their top-left-most run.
    pub fn finished(&self) -> &[PartId] {
        &self.finished
    }

    pub fn value(&self, id: PartId) -> u8 {
        self.parts[id.index()].value
    }

    /// Pixel count of the part and everything absorbed into it.
    pub fn pixel_count(&self, id: PartId) -> u64 {
        self.parts[id.index()].pixel_count
    }

    pub fn children(&self, id: PartId) -> &[PartId] {
        &self.parts[id.index()].children
    }

    /// Follows parent links up to the part that currently owns `id`.
    pub fn root(&self, mut id: PartId) -> PartId {
        while let Some(parent) = self.parts[id.index()].parent {
            id = parent;
        }
        id
    }

    /// Groups `runs` into connected parts. `runs` must be ordered by row, then by
    /// start column, as produced by the scanline extractor.
    pub fn merge_runs(&mut self, runs: &[ScanlineRun]) {
        self.clear();

        let mut row_start = 0;
        while row_start < runs.len() {
            let row = runs[row_start].row;
            let row_len = runs[row_start..]
                .iter()
                .take_while(|run| run.row == row)
                .count();
            let row_end = row_start + row_len;

            let adjacent = self
                .frontier
                .first()
                .is_some_and(|&(idx, _)| runs[idx as usize].row + 1 == row);
            if !adjacent {
                // A gap of empty rows: nothing on the frontier can continue.
                self.close_untouched(row);
                self.frontier.clear();
            }

            self.current.clear();
            let mut cursor = 0;
            for idx in row_start..row_end {
                let run = &runs[idx];

                while cursor < self.frontier.len()
                    && runs[self.frontier[cursor].0 as usize].end() <= run.start
                {
                    cursor += 1;
                }

                self.matched.clear();
                for &(prev_idx, prev_part) in &self.frontier[cursor..] {
                    let prev = &runs[prev_idx as usize];
                    if prev.start >= run.end() {
                        break;
                    }
                    if prev.value != run.value {
                        continue;
                    }
                    let root = self.root(prev_part);
                    if !self.matched.contains(&root) {
                        self.matched.push(root);
                    }
                }

                let part = match self.matched.len() {
                    0 => self.new_part(run, idx as u32),
                    1 => self.matched[0],
                    _ => self.merge_matched(),
                };
                self.attach(part, run, idx as u32);
                self.current.push((idx as u32, part));
            }

            self.close_untouched(row);
            std::mem::swap(&mut self.frontier, &mut self.current);
            row_start = row_end;
        }

        self.close_untouched(u32::MAX);
        self.frontier.clear();

        let parts = &self.parts;
        self.finished
            .sort_unstable_by_key(|id| parts[id.index()].first_run);
    }

    /// Copies the runs of `id` and of every part absorbed into it into `out`,
    /// sorted by row, then start column.
    pub fn collect_runs(&mut self, id: PartId, runs: &[ScanlineRun], out: &mut Vec<ScanlineRun>) {
        out.clear();
        let mut stack = std::mem::take(&mut self.stack);
        stack.clear();
        stack.push(id);

        while let Some(part) = stack.pop() {
            let record = &self.parts[part.index()];
            out.extend(record.runs.iter().map(|&idx| runs[idx as usize]));
            stack.extend_from_slice(&record.children);
        }

        self.stack = stack;
        out.sort_unstable_by_key(|run| (run.row, run.start));
    }

    fn new_part(&mut self, run: &ScanlineRun, run_idx: u32) -> PartId {
        let id = PartId(self.parts.len() as u32);
        self.parts.push(PartRecord {
            value: run.value,
            runs: Vec::new(),
            children: Vec::new(),
            parent: None,
            pixel_count: 0,
            first_run: run_idx,
            last_row: run.row,
            closed: false,
        });
        id
    }

    fn attach(&mut self, id: PartId, run: &ScanlineRun, run_idx: u32) {
        let record = &mut self.parts[id.index()];
        record.runs.push(run_idx);
        record.pixel_count += run.len as u64;
        record.first_run = record.first_run.min(run_idx);
        record.last_row = record.last_row.max(run.row);
    }

    /// Merges every part in `self.matched` into one and returns the survivor.
    fn merge_matched(&mut self) -> PartId {
        let parts = &self.parts;
        let survivor = self
            .matched
            .iter()
            .copied()
            .max_by(|a, b| {
                parts[a.index()]
                    .pixel_count
                    .cmp(&parts[b.index()].pixel_count)
                    .then_with(|| b.cmp(a))
            })
            .unwrap_or(self.matched[0]);

        for i in 0..self.matched.len() {
            let absorbed = self.matched[i];
            if absorbed == survivor {
                continue;
            }
            let (pixels, first_run, last_row) = {
                let record = &mut self.parts[absorbed.index()];
                record.parent = Some(survivor);
                (record.pixel_count, record.first_run, record.last_row)
            };
            let target = &mut self.parts[survivor.index()];
            target.children.push(absorbed);
            target.pixel_count += pixels;
            target.first_run = target.first_run.min(first_run);
            target.last_row = target.last_row.max(last_row);
            trace!("part {:?} absorbed into {:?}", absorbed, survivor);
        }

        survivor
    }

    /// Closes frontier parts that did not grow in `row`.
    fn close_untouched(&mut self, row: u32) {
        for i in 0..self.frontier.len() {
            let root = self.root(self.frontier[i].1);
            let record = &mut self.parts[root.index()];
            if !record.closed && record.last_row < row {
                record.closed = true;
                self.finished.push(root);
            }
        }
    }
}
