//! The default stage plan.
//!
//! Stage order is fixed: each stage consumes the previous stage's artifacts,
//! so the plan is inherently sequential. Tissue detection and QC inference
//! are required; report and overlay generation are optional presentation
//! stages.

use crate::config::RunOptions;
use crate::stage::StageSpec;

/// Tissue detection stage name.
pub const STAGE_TISSUE_DETECT: &str = "tissue_detect";
/// QC inference stage name.
pub const STAGE_QC: &str = "qc";
/// Report generation stage name.
pub const STAGE_REPORT: &str = "report";
/// Overlay generation stage name.
pub const STAGE_OVERLAY: &str = "overlay";

const TISSUE_DETECT_SCRIPT: &str = "wsi_tis_detect.py";
const QC_SCRIPT: &str = "wsi_process.py";
const REPORT_SCRIPT: &str = "generate_report.py";
const OVERLAY_SCRIPT: &str = "generate_overlays.py";

/// Builds the ordered stage list for a run request.
#[must_use]
pub fn build_stage_plan(options: &RunOptions) -> Vec<StageSpec> {
    let mut plan = Vec::with_capacity(4);

    plan.push(apply_timeout(
        StageSpec::new(STAGE_TISSUE_DETECT, TISSUE_DETECT_SCRIPT),
        options,
    ));

    let mut qc = StageSpec::new(STAGE_QC, QC_SCRIPT)
        .with_args(["--mpp", &format!("{:.1}", options.resolution.mpp())]);
    if options.geojson {
        qc = qc.with_arg("--geojson");
    }
    plan.push(apply_timeout(qc, options));

    if !options.skip_report {
        plan.push(apply_timeout(
            StageSpec::new(STAGE_REPORT, REPORT_SCRIPT)
                .optional()
                .with_arg("--pdf"),
            options,
        ));
    }
    if !options.skip_overlay {
        plan.push(apply_timeout(
            StageSpec::new(STAGE_OVERLAY, OVERLAY_SCRIPT).optional(),
            options,
        ));
    }

    plan
}

fn apply_timeout(spec: StageSpec, options: &RunOptions) -> StageSpec {
    match options.stage_timeout {
        Some(timeout) => spec.with_timeout(timeout),
        None => spec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelResolution;
    use std::time::Duration;

    #[test]
    fn test_default_plan_order_and_policy() {
        let plan = build_stage_plan(&RunOptions::new("sample.svs"));
        let names: Vec<&str> = plan.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![STAGE_TISSUE_DETECT, STAGE_QC, STAGE_REPORT, STAGE_OVERLAY]
        );
        let required: Vec<bool> = plan.iter().map(|s| s.required).collect();
        assert_eq!(required, vec![true, true, false, false]);
    }

    #[test]
    fn test_skip_flags_drop_optional_stages() {
        let options = RunOptions::new("sample.svs").skip_report().skip_overlay();
        let plan = build_stage_plan(&options);
        let names: Vec<&str> = plan.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![STAGE_TISSUE_DETECT, STAGE_QC]);
    }

    #[test]
    fn test_qc_stage_carries_resolution_and_geojson() {
        let options = RunOptions::new("sample.svs")
            .with_resolution(ModelResolution::X7)
            .with_geojson();
        let plan = build_stage_plan(&options);

        let qc = plan.iter().find(|s| s.name == STAGE_QC).unwrap();
        assert_eq!(qc.extra_args, vec!["--mpp", "1.5", "--geojson"]);
    }

    #[test]
    fn test_stage_timeout_applies_to_all_stages() {
        let options = RunOptions::new("sample.svs")
            .with_stage_timeout(Duration::from_secs(90));
        let plan = build_stage_plan(&options);
        assert!(plan.iter().all(|s| s.timeout == Some(Duration::from_secs(90))));
    }
}
