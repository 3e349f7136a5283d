//! SARIF 2.1.0 rendering of engine output for editor and CI consumption.

use serde_json::json;
use serde_sarif::sarif::{
    ArtifactLocation, Location, LogicalLocation, Message, MultiformatMessageString,
    PhysicalLocation, Region, ReportingDescriptor, Result as SarifResult, ResultLevel, Run,
    SCHEMA_URL, Sarif, Tool, ToolComponent,
};

use crate::engine::EngineOutput;
use crate::rules::{Finding, RuleMetadata, Severity};

const TOOL_NAME: &str = "stacklint";
const TOOL_URI: &str = "https://github.com/stacklint/stacklint";

fn rule_descriptor(metadata: &RuleMetadata) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(metadata.id)
        .name(metadata.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(metadata.description)
                .build(),
        )
        .build()
}

fn severity_level(severity: Severity) -> ResultLevel {
    match severity {
        Severity::Normal => ResultLevel::Warning,
        Severity::Low => ResultLevel::Note,
    }
}

fn method_location(finding: &Finding) -> Location {
    let logical = LogicalLocation::builder()
        .name(format!(
            "{}.{}{}",
            finding.class_name, finding.method_name, finding.descriptor
        ))
        .kind("function")
        .build();
    if let Some(source_file) = &finding.source_file {
        let artifact_location = ArtifactLocation::builder()
            .uri(source_file.clone())
            .build();
        let physical = if let Some(line) = finding.source_line {
            let region = Region::builder().start_line(line as i64).build();
            PhysicalLocation::builder()
                .artifact_location(artifact_location)
                .region(region)
                .build()
        } else {
            PhysicalLocation::builder()
                .artifact_location(artifact_location)
                .build()
        };
        return Location::builder()
            .logical_locations(vec![logical])
            .physical_location(physical)
            .build();
    }
    Location::builder().logical_locations(vec![logical]).build()
}

fn finding_result(finding: &Finding) -> SarifResult {
    let message = Message::builder()
        .text(format!(
            "{} in {}.{}{}",
            finding.rule_id, finding.class_name, finding.method_name, finding.descriptor
        ))
        .build();
    SarifResult::builder()
        .rule_id(finding.rule_id)
        .level(severity_level(finding.severity))
        .message(message)
        .locations(vec![method_location(finding)])
        .build()
}

/// Render one engine run as a SARIF document.
pub fn build_sarif(rules: &[RuleMetadata], output: &EngineOutput) -> Sarif {
    let descriptors: Vec<ReportingDescriptor> = rules.iter().map(rule_descriptor).collect();
    let driver = if descriptors.is_empty() {
        ToolComponent::builder()
            .name(TOOL_NAME)
            .information_uri(TOOL_URI)
            .build()
    } else {
        ToolComponent::builder()
            .name(TOOL_NAME)
            .information_uri(TOOL_URI)
            .rules(descriptors)
            .build()
    };
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let results: Vec<SarifResult> = output.findings.iter().map(finding_result).collect();
    let run = Run::builder().tool(tool).results(results).build();

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
