//! Stage sequences for the dashboard's workflow use sites.

use super::StageDef;
use crate::config::WorkflowConfig;
use crate::workflow::ProgressMode;

/// Field key for the project name on the permit wizard.
pub const PROJECT_NAME: &str = "project_name";
/// Field key for the analysis focus area on the permit wizard.
pub const FOCUS_AREA: &str = "focus_area";
/// Field key for the analysis type on the analysis wizard.
pub const ANALYSIS_TYPE: &str = "analysis_type";
/// Field key for the reviewer decision on the approval funnel.
pub const DECISION: &str = "decision";

const LIDAR_FILES: &str = r"(?i)\.(las|laz)$";
const DRAWING_OR_SCAN_FILES: &str = r"(?i)\.(las|laz|dwg|dxf)$";
const DOCUMENT_FILES: &str = r"(?i)\.(pdf|docx|xlsx|dwg|dxf)$";

/// Four-step permit application wizard with discrete progress.
#[must_use]
pub fn permit_wizard() -> WorkflowConfig {
    WorkflowConfig::new("permit-wizard")
        .with_progress_mode(ProgressMode::Discrete)
        .with_stage(
            StageDef::new("project-info", "Project Information")
                .require([PROJECT_NAME, FOCUS_AREA])
                .with_description("Project name, focus area and an optional description."),
        )
        .with_stage(
            StageDef::new("lidar-scan", "LIDAR Scan")
                .min_artifacts(1)
                .accept_artifacts(LIDAR_FILES),
        )
        .with_stage(StageDef::new("ai-analysis", "AI Analysis").async_completion())
        .with_stage(StageDef::new("submit-application", "Submit Application"))
}

/// Three-step LIDAR / 2D drawing analysis wizard.
#[must_use]
pub fn analysis_wizard() -> WorkflowConfig {
    WorkflowConfig::new("analysis-wizard")
        .with_progress_mode(ProgressMode::Discrete)
        .with_stage(StageDef::new("select-type", "Select Analysis Type").require([ANALYSIS_TYPE]))
        .with_stage(
            StageDef::new("upload", "Upload File")
                .min_artifacts(1)
                .accept_artifacts(DRAWING_OR_SCAN_FILES),
        )
        .with_stage(StageDef::new("analysis", "Run Analysis").async_completion())
}

/// Five-milestone permit process tracker with continuous sub-progress.
#[must_use]
pub fn permit_process_tracker() -> WorkflowConfig {
    WorkflowConfig::new("permit-process-tracker")
        .with_progress_mode(ProgressMode::Continuous)
        .with_stage(
            StageDef::new("application-submitted", "Application Submitted")
                .with_description("Initial permit application submitted for review."),
        )
        .with_stage(
            StageDef::new("initial-review", "Initial Review")
                .with_description("Preliminary review of the application by the permit office."),
        )
        .with_stage(
            StageDef::new("lidar-scan", "LIDAR Scan")
                .with_description("3D scanning of the construction site using LIDAR technology."),
        )
        .with_stage(
            StageDef::new("ai-analysis", "AI Analysis")
                .with_description("Automated analysis of LIDAR data and permit application.")
                .async_completion()
                .auto_advance(),
        )
        .with_stage(
            StageDef::new("final-approval", "Final Approval")
                .with_description("Final review and approval of the permit application."),
        )
}

/// Document approval funnel with automatic verification.
#[must_use]
pub fn document_approval() -> WorkflowConfig {
    WorkflowConfig::new("document-approval")
        .with_progress_mode(ProgressMode::CompletedRatio)
        .with_stage(
            StageDef::new("upload", "Upload Documents")
                .min_artifacts(1)
                .accept_artifacts(DOCUMENT_FILES),
        )
        .with_stage(
            StageDef::new("auto-check", "Automatic Check")
                .with_description("Checks that the required documents are present and valid.")
                .async_completion()
                .auto_advance(),
        )
        .with_stage(StageDef::new("approval", "Approval").require([DECISION]))
}

/// All presets, keyed by workflow name.
#[must_use]
pub fn all() -> Vec<WorkflowConfig> {
    vec![
        permit_wizard(),
        analysis_wizard(),
        permit_process_tracker(),
        document_approval(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_build() {
        for preset in all() {
            let instance = preset.build().unwrap();
            assert!(!instance.is_empty(), "{} has no stages", preset.name);
        }
    }

    #[test]
    fn test_permit_wizard_shape() {
        let instance = permit_wizard().build().unwrap();
        let ids: Vec<_> = instance.stages().iter().map(|s| s.id.as_str()).collect();

        assert_eq!(
            ids,
            vec!["project-info", "lidar-scan", "ai-analysis", "submit-application"]
        );
        assert_eq!(instance.progress_mode(), ProgressMode::Discrete);
        assert!(instance.stages()[2].is_async());
    }

    #[test]
    fn test_analysis_wizard_accepts_scans_and_drawings() {
        let instance = analysis_wizard().build().unwrap();
        let upload = &instance.stages()[1];

        assert!(upload.accepts_artifact("site.laz"));
        assert!(upload.accepts_artifact("floor.DXF"));
        assert!(!upload.accepts_artifact("photo.png"));
    }

    #[test]
    fn test_tracker_uses_continuous_progress() {
        let config = permit_process_tracker();
        assert_eq!(config.progress_mode, ProgressMode::Continuous);
        assert_eq!(config.stages.len(), 5);
    }
}
