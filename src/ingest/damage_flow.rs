//! Per-shot damage-flow reconstruction.
//!
//! Every attack row in an export reports the raw damage of each lane, what
//! each mitigation layer removed, and how the remainder split between shield
//! and hull. From those fields this module rebuilds the chain a hit goes
//! through:
//!
//! ```text
//! total_iso    - mitigated_iso    = iso_remain    ┐
//!                                                 ├─ remain_before_apex
//! total_normal - mitigated_normal = normal_remain ┘
//!
//! damage_before_apex - mitigated_apex = damage_after_apex = shield_damage + hull_damage
//! ```
//!
//! `damage_before_apex` is recovered from the pool side (after + apex) and
//! `remain_before_apex` from the lane side; the two are derived independently
//! and should agree. `accounting_delta` is the full identity residual.
//!
//! All arithmetic is row-local. A missing operand makes that row's derived
//! value missing; a zero denominator makes a ratio missing.

use serde::Serialize;
use tracing::info;

use crate::ingest::table::{Cell, Table};

/// Nominal Apex Barrier capacity used by the per-hit estimate.
pub const APEX_BARRIER_CAPACITY: f64 = 10_000.0;

/// Relative tolerance for treating `accounting_delta` as zero.
pub const ACCOUNTING_TOLERANCE: f64 = 1e-6;

/// Derived columns in the order they are appended.
pub const DAMAGE_FLOW_COLUMNS: [&str; 9] = [
    "applied_damage",
    "damage_after_apex",
    "damage_before_apex",
    "iso_remain",
    "normal_remain",
    "remain_before_apex",
    "apex_r",
    "apex_barrier_hit",
    "accounting_delta",
];

/// Damage fields of one combat row, under canonical names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DamageInputs {
    pub total_iso: Option<f64>,
    pub total_normal: Option<f64>,
    pub mitigated_iso: Option<f64>,
    pub mitigated_normal: Option<f64>,
    pub mitigated_apex: Option<f64>,
    pub shield_damage: Option<f64>,
    pub hull_damage: Option<f64>,
}

impl DamageInputs {
    pub fn from_row(table: &Table, row: usize) -> Self {
        Self {
            total_iso: table.number(row, "total_iso"),
            total_normal: table.number(row, "total_normal"),
            mitigated_iso: table.number(row, "mitigated_iso"),
            mitigated_normal: table.number(row, "mitigated_normal"),
            mitigated_apex: table.number(row, "mitigated_apex"),
            shield_damage: table.number(row, "shield_damage"),
            hull_damage: table.number(row, "hull_damage"),
        }
    }
}

/// Reconstructed mitigation chain for one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DamageFlow {
    /// Damage that reached the shield and hull pools.
    pub applied_damage: Option<f64>,
    /// Same value as `applied_damage`, named for its place in the chain.
    pub damage_after_apex: Option<f64>,
    pub damage_before_apex: Option<f64>,
    pub iso_remain: Option<f64>,
    pub normal_remain: Option<f64>,
    pub remain_before_apex: Option<f64>,
    /// Fraction of the pre-Apex remainder that got through the barrier.
    pub apex_r: Option<f64>,
    /// Estimated barrier capacity consumed by this hit, assuming a nominal
    /// capacity of [`APEX_BARRIER_CAPACITY`] that absorbs in proportion to
    /// mitigated / post-mitigation damage. Back-calculated from the log, not
    /// reported by the game.
    pub apex_barrier_hit: Option<f64>,
    /// Raw lane totals minus everything accounted for downstream. Zero up to
    /// rounding for a consistent row.
    pub accounting_delta: Option<f64>,
}

impl DamageFlow {
    /// Whether `accounting_delta` is zero within `tolerance`, relative to the
    /// raw lane total. `None` when either side is missing.
    pub fn is_consistent(&self, inputs: &DamageInputs, tolerance: f64) -> Option<bool> {
        let delta = self.accounting_delta?;
        let raw_total = add(inputs.total_iso, inputs.total_normal)?;
        Some(delta.abs() <= tolerance * raw_total.abs().max(1.0))
    }

    fn cells(&self) -> [Cell; 9] {
        [
            Cell::from_option(self.applied_damage),
            Cell::from_option(self.damage_after_apex),
            Cell::from_option(self.damage_before_apex),
            Cell::from_option(self.iso_remain),
            Cell::from_option(self.normal_remain),
            Cell::from_option(self.remain_before_apex),
            Cell::from_option(self.apex_r),
            Cell::from_option(self.apex_barrier_hit),
            Cell::from_option(self.accounting_delta),
        ]
    }
}

fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let denominator = denominator?;
    if denominator == 0.0 {
        return None;
    }
    Some(numerator? / denominator)
}

/// Run the eight reconstruction stages for one row. Later stages read the
/// values derived by earlier ones.
pub fn reconstruct(inputs: &DamageInputs) -> DamageFlow {
    let applied_damage = add(inputs.shield_damage, inputs.hull_damage);
    let damage_after_apex = applied_damage;
    let damage_before_apex = add(damage_after_apex, inputs.mitigated_apex);

    let iso_remain = sub(inputs.total_iso, inputs.mitigated_iso);
    let normal_remain = sub(inputs.total_normal, inputs.mitigated_normal);
    let remain_before_apex = add(iso_remain, normal_remain);

    let apex_r = ratio(damage_after_apex, damage_before_apex);
    let apex_barrier_hit = ratio(inputs.mitigated_apex, damage_after_apex)
        .map(|fraction| (APEX_BARRIER_CAPACITY * fraction).round_ties_even());

    let raw_total = add(inputs.total_iso, inputs.total_normal);
    let accounted = [
        inputs.mitigated_normal,
        inputs.mitigated_apex,
        inputs.shield_damage,
        inputs.hull_damage,
    ]
    .into_iter()
    .fold(inputs.mitigated_iso, add);
    let accounting_delta = sub(raw_total, accounted);

    DamageFlow {
        applied_damage,
        damage_after_apex,
        damage_before_apex,
        iso_remain,
        normal_remain,
        remain_before_apex,
        apex_r,
        apex_barrier_hit,
        accounting_delta,
    }
}

/// Append the reconstructed columns to a canonical-named combat table.
/// Existing columns of the same names are overwritten.
pub fn append_damage_flow(table: &mut Table) {
    let mut columns: [Vec<Cell>; 9] = Default::default();
    for row in 0..table.len() {
        let flow = reconstruct(&DamageInputs::from_row(table, row));
        for (column, cell) in columns.iter_mut().zip(flow.cells()) {
            column.push(cell);
        }
    }
    for (name, values) in DAMAGE_FLOW_COLUMNS.into_iter().zip(columns) {
        table.set_column(name, values);
    }

    let summary = accounting_summary(table, ACCOUNTING_TOLERANCE);
    if summary.rows_inconsistent > 0 {
        info!(
            rows_checked = summary.rows_checked,
            rows_inconsistent = summary.rows_inconsistent,
            max_abs_delta = summary.max_abs_delta,
            "accounting delta outside tolerance on some rows"
        );
    }
}

/// Diagnostic roll-up of `accounting_delta` across a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccountingSummary {
    /// Rows where the delta and raw total could both be computed.
    pub rows_checked: usize,
    pub rows_inconsistent: usize,
    pub max_abs_delta: f64,
}

pub fn accounting_summary(table: &Table, tolerance: f64) -> AccountingSummary {
    let mut summary = AccountingSummary::default();
    for row in 0..table.len() {
        let inputs = DamageInputs::from_row(table, row);
        let flow = DamageFlow {
            accounting_delta: table.number(row, "accounting_delta"),
            ..DamageFlow::default()
        };
        let Some(consistent) = flow.is_consistent(&inputs, tolerance) else {
            continue;
        };
        summary.rows_checked += 1;
        if !consistent {
            summary.rows_inconsistent += 1;
        }
        if let Some(delta) = flow.accounting_delta {
            summary.max_abs_delta = summary.max_abs_delta.max(delta.abs());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_hit() -> DamageInputs {
        DamageInputs {
            total_iso: Some(0.0),
            total_normal: Some(1000.0),
            mitigated_iso: Some(0.0),
            mitigated_normal: Some(0.0),
            mitigated_apex: Some(200.0),
            shield_damage: Some(600.0),
            hull_damage: Some(200.0),
        }
    }

    #[test]
    fn reconstructs_documented_apex_example() {
        let flow = reconstruct(&full_hit());

        assert_eq!(flow.applied_damage, Some(800.0));
        assert_eq!(flow.damage_after_apex, Some(800.0));
        assert_eq!(flow.damage_before_apex, Some(1000.0));
        assert_eq!(flow.normal_remain, Some(1000.0));
        assert_eq!(flow.iso_remain, Some(0.0));
        assert_eq!(flow.remain_before_apex, Some(1000.0));
        assert_eq!(flow.apex_r, Some(0.8));
        assert_eq!(flow.apex_barrier_hit, Some(2500.0));
        assert_eq!(flow.accounting_delta, Some(0.0));
        assert_eq!(flow.is_consistent(&full_hit(), ACCOUNTING_TOLERANCE), Some(true));
    }

    #[test]
    fn fully_absorbed_hit_has_no_barrier_estimate() {
        let inputs = DamageInputs {
            total_normal: Some(50.0),
            total_iso: Some(0.0),
            mitigated_iso: Some(0.0),
            mitigated_normal: Some(0.0),
            mitigated_apex: Some(50.0),
            shield_damage: Some(0.0),
            hull_damage: Some(0.0),
        };
        let flow = reconstruct(&inputs);

        assert_eq!(flow.damage_after_apex, Some(0.0));
        assert_eq!(flow.apex_barrier_hit, None);
        assert_eq!(flow.apex_r, Some(0.0));
        assert_eq!(flow.accounting_delta, Some(0.0));
    }

    #[test]
    fn zero_before_apex_leaves_ratio_missing() {
        let inputs = DamageInputs {
            mitigated_apex: Some(0.0),
            shield_damage: Some(0.0),
            hull_damage: Some(0.0),
            ..DamageInputs::default()
        };
        let flow = reconstruct(&inputs);
        assert_eq!(flow.damage_before_apex, Some(0.0));
        assert_eq!(flow.apex_r, None);
    }

    #[test]
    fn missing_operand_propagates_only_to_dependent_values() {
        let inputs = DamageInputs {
            hull_damage: None,
            ..full_hit()
        };
        let flow = reconstruct(&inputs);

        assert_eq!(flow.applied_damage, None);
        assert_eq!(flow.damage_before_apex, None);
        assert_eq!(flow.apex_r, None);
        assert_eq!(flow.apex_barrier_hit, None);
        assert_eq!(flow.accounting_delta, None);
        assert_eq!(flow.normal_remain, Some(1000.0));
        assert_eq!(flow.remain_before_apex, Some(1000.0));
    }

    #[test]
    fn barrier_estimate_rounds_half_to_even() {
        let estimate = |mitigated: f64, after: f64| {
            reconstruct(&DamageInputs {
                mitigated_apex: Some(mitigated),
                shield_damage: Some(after),
                hull_damage: Some(0.0),
                ..DamageInputs::default()
            })
            .apex_barrier_hit
        };
        // 10_000 / 32 = 312.5, 10_000 * 3 / 32 = 937.5
        assert_eq!(estimate(1.0, 32.0), Some(312.0));
        assert_eq!(estimate(3.0, 32.0), Some(938.0));
        assert_eq!(estimate(1.0, 3.0), Some(3333.0));
    }

    #[test]
    fn apex_round_trip_is_exact() {
        let samples = [
            (123.456, 78.9, 0.1),
            (0.3, 0.6, 0.7),
            (1e9, 3.0, 17.25),
        ];
        for (shield, hull, apex) in samples {
            let flow = reconstruct(&DamageInputs {
                shield_damage: Some(shield),
                hull_damage: Some(hull),
                mitigated_apex: Some(apex),
                ..DamageInputs::default()
            });
            let before = flow.damage_before_apex.expect("before");
            let after = flow.damage_after_apex.expect("after");
            assert_eq!(flow.applied_damage.map(f64::to_bits), Some(after.to_bits()));
            assert!((before - apex - after).abs() <= 4.0 * f64::EPSILON * before.abs().max(1.0));
        }
    }

    #[test]
    fn accounting_delta_surfaces_inconsistency() {
        let inputs = DamageInputs {
            shield_damage: Some(650.0),
            ..full_hit()
        };
        let flow = reconstruct(&inputs);
        assert_eq!(flow.accounting_delta, Some(-50.0));
        assert_eq!(flow.is_consistent(&inputs, ACCOUNTING_TOLERANCE), Some(false));
    }

    #[test]
    fn append_adds_columns_and_summary_counts_rows() {
        let mut table = Table::from_rows(
            vec![
                "total_iso".into(),
                "total_normal".into(),
                "mitigated_iso".into(),
                "mitigated_normal".into(),
                "mitigated_apex".into(),
                "shield_damage".into(),
                "hull_damage".into(),
            ],
            vec![
                [0.0, 1000.0, 0.0, 0.0, 200.0, 600.0, 200.0]
                    .into_iter()
                    .map(Cell::Number)
                    .collect(),
                [0.0, 1000.0, 0.0, 0.0, 200.0, 700.0, 200.0]
                    .into_iter()
                    .map(Cell::Number)
                    .collect(),
                vec![Cell::Missing; 7],
            ],
        );
        append_damage_flow(&mut table);

        for column in DAMAGE_FLOW_COLUMNS {
            assert!(table.has_column(column), "missing {column}");
        }
        assert_eq!(table.number(0, "apex_barrier_hit"), Some(2500.0));
        assert!(table.cell(2, "applied_damage").is_missing());

        let summary = accounting_summary(&table, ACCOUNTING_TOLERANCE);
        assert_eq!(summary.rows_checked, 2);
        assert_eq!(summary.rows_inconsistent, 1);
        assert_eq!(summary.max_abs_delta, 100.0);
    }
}
