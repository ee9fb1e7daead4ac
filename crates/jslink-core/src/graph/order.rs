//! Deterministic module numbering and execution order.

use super::{Module, RecordTarget};
use crate::ids::ModuleIdx;
use crate::scheduler::{ScanResult, ScanTarget};

pub(super) struct Numbering {
    /// Provisional ids in final order.
    pub order: Vec<usize>,
    /// Final index of each provisional id.
    pub final_of: Vec<Option<ModuleIdx>>,
}

/// Pre-order depth-first walk from the entries, following records in source
/// order. Dynamic imports are followed too so lazily loaded modules are
/// numbered as well.
pub(super) fn number_modules(scan: &ScanResult) -> Numbering {
    let mut final_of = vec![None; scan.modules.len()];
    let mut order = Vec::with_capacity(scan.modules.len());
    let mut stack: Vec<usize> = scan.entries.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
        if final_of[id].is_some() {
            continue;
        }
        final_of[id] = Some(ModuleIdx::new(order.len()));
        order.push(id);
        for target in scan.modules[id].targets.iter().rev() {
            if let ScanTarget::Module(next) = target {
                if final_of[*next].is_none() {
                    stack.push(*next);
                }
            }
        }
    }
    Numbering { order, final_of }
}

/// Post-order over eager edges: a module runs after everything it imports,
/// except where a cycle makes that impossible. Modules only reachable through
/// `import()` follow, in index order.
pub(super) fn exec_order(modules: &[Module], entries: &[ModuleIdx]) -> Vec<ModuleIdx> {
    let mut visited = vec![false; modules.len()];
    let mut order = Vec::with_capacity(modules.len());
    let roots = entries
        .iter()
        .copied()
        .chain((0..modules.len()).map(ModuleIdx::new));

    for root in roots {
        if visited[root.index()] {
            continue;
        }
        visited[root.index()] = true;
        // (module, next record to look at)
        let mut stack: Vec<(ModuleIdx, usize)> = vec![(root, 0)];
        while let Some(&(idx, mut cursor)) = stack.last() {
            let module = &modules[idx.index()];
            let mut child = None;
            while cursor < module.import_targets.len() {
                let record = cursor;
                cursor += 1;
                if !module.ast.import_records[record].kind.is_eager() {
                    continue;
                }
                if let RecordTarget::Module(target) = module.import_targets[record] {
                    if !visited[target.index()] {
                        child = Some(target);
                        break;
                    }
                }
            }
            if let Some(top) = stack.last_mut() {
                top.1 = cursor;
            }
            match child {
                Some(target) => {
                    visited[target.index()] = true;
                    stack.push((target, 0));
                }
                None => {
                    stack.pop();
                    order.push(idx);
                }
            }
        }
    }
    order
}
