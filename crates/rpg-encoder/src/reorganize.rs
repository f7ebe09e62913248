//! Structural reorganization: domain discovery and hierarchical construction.
//!
//! Consumes only file-level features (granularity-based compression), asks
//! the LLM for functional areas and a three-level hierarchy, and replaces any
//! directory-mirroring structure with semantic chain nodes.

use crate::llm::{LlmClient, ask_solution_json};
use crate::normalize::normalize_phrase;
use rpg_core::error::{Result, RpgError};
use rpg_core::model::SemanticFeature;
use rpg_store::rpg::{HighLevelNodeArgs, Rpg};
use rpg_store::{GraphStore, NodeFilter};
use std::collections::BTreeMap;
use std::time::Duration;

const DOMAIN_DISCOVERY_SYSTEM: &str = include_str!("prompts/domain_discovery.md");
const HIERARCHY_SYSTEM: &str = include_str!("prompts/hierarchy_construction.md");

/// Synthetic area for files no assignment covers.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One file's summary inside a group.
#[derive(Debug, Clone)]
pub struct FileFeatureEntry {
    pub file_id: String,
    pub file_path: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Files grouped by top-level directory.
#[derive(Debug, Clone)]
pub struct FileFeatureGroup {
    pub label: String,
    pub files: Vec<FileFeatureEntry>,
}

/// Outcome counts for a reorganization pass.
#[derive(Debug, Default)]
pub struct ReorganizeSummary {
    pub areas: usize,
    pub chains: usize,
    pub attached_files: usize,
    pub uncategorized_files: usize,
}

/// Top-level directory of a relative path, or "root".
fn top_level_dir(path: &str) -> String {
    match path.split_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => "root".to_string(),
    }
}

/// Collect file-level nodes into top-level-directory groups.
pub fn group_files_by_top_dir(rpg: &Rpg) -> Result<Vec<FileFeatureGroup>> {
    let mut groups: BTreeMap<String, Vec<FileFeatureEntry>> = BTreeMap::new();
    for node in rpg.store().get_nodes(&NodeFilter {
        high_level: Some(false),
        entity_type: Some(rpg_core::model::EntityType::File),
        ..Default::default()
    })? {
        let Some(path) = node.path().map(String::from) else {
            continue;
        };
        groups
            .entry(top_level_dir(&path))
            .or_default()
            .push(FileFeatureEntry {
                file_id: node.id().to_string(),
                file_path: path,
                description: node.feature().description.clone(),
                keywords: node.feature().keywords.clone(),
            });
    }
    Ok(groups
        .into_iter()
        .map(|(label, files)| FileFeatureGroup { label, files })
        .collect())
}

fn render_groups(groups: &[FileFeatureGroup]) -> String {
    let mut out = String::new();
    for group in groups {
        out.push_str(&format!("## group: {}\n", group.label));
        for file in &group.files {
            out.push_str(&format!(
                "- {} — {} [{}]\n",
                file.file_path,
                file.description,
                file.keywords.join(", ")
            ));
        }
        out.push('\n');
    }
    out
}

/// Normalize a candidate area name to PascalCase.
fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Step 1: ask for the functional areas. The shared solution parser retries
/// once internally; an empty validated list re-asks once more, then is fatal.
pub async fn discover_domains(
    llm: &dyn LlmClient,
    groups: &[FileFeatureGroup],
    deadline: Duration,
) -> Result<Vec<String>> {
    let prompt = format!(
        "Identify the functional areas of this repository.\n\n{}",
        render_groups(groups)
    );

    let mut areas = validate_areas(
        ask_solution_json::<Vec<String>>(llm, DOMAIN_DISCOVERY_SYSTEM, &prompt, deadline).await?,
    );
    if areas.is_empty() {
        let corrective = format!(
            "{prompt}\n\nYour previous answer contained no usable PascalCase names. \
             Return a non-empty JSON array of PascalCase functional-area names."
        );
        areas = validate_areas(
            ask_solution_json::<Vec<String>>(llm, DOMAIN_DISCOVERY_SYSTEM, &corrective, deadline)
                .await?,
        );
    }
    if areas.is_empty() {
        return Err(RpgError::Llm(
            "domain discovery produced no functional areas after retry".to_string(),
        ));
    }
    Ok(areas)
}

fn validate_areas(raw: Vec<String>) -> Vec<String> {
    let mut areas = Vec::new();
    for name in raw {
        let normalized = pascal_case(&name);
        if !normalized.is_empty() && !areas.contains(&normalized) {
            areas.push(normalized);
        }
    }
    areas
}

/// Step 2: ask for the three-level hierarchy assignment.
pub async fn construct_hierarchy(
    llm: &dyn LlmClient,
    areas: &[String],
    groups: &[FileFeatureGroup],
    deadline: Duration,
) -> Result<BTreeMap<String, Vec<String>>> {
    let prompt = format!(
        "Functional areas: {}\n\nAssign every group to a three-level path.\n\n{}",
        areas.join(", "),
        render_groups(groups)
    );

    let assignment =
        ask_solution_json::<BTreeMap<String, Vec<String>>>(llm, HIERARCHY_SYSTEM, &prompt, deadline)
            .await?;
    if let Some(violation) = validate_assignment(&assignment) {
        tracing::warn!("hierarchy violation, re-asking: {violation}");
        let corrective = format!(
            "{prompt}\n\nYour previous answer was invalid: {violation}. Every key must have \
             exactly three /-separated segments, with lowercase verb+object category and \
             subcategory names."
        );
        let assignment = ask_solution_json::<BTreeMap<String, Vec<String>>>(
            llm,
            HIERARCHY_SYSTEM,
            &corrective,
            deadline,
        )
        .await?;
        if let Some(violation) = validate_assignment(&assignment) {
            return Err(RpgError::Validation(format!(
                "hierarchical construction invalid after retry: {violation}"
            )));
        }
        return Ok(assignment);
    }
    Ok(assignment)
}

fn validate_assignment(assignment: &BTreeMap<String, Vec<String>>) -> Option<String> {
    if assignment.is_empty() {
        return Some("empty assignment".to_string());
    }
    for key in assignment.keys() {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != 3 {
            return Some(format!("path '{key}' does not have exactly three levels"));
        }
        for segment in &segments[1..] {
            if segment.is_empty() || segment.chars().any(|c| c.is_uppercase()) {
                return Some(format!("segment '{segment}' in '{key}' is not lowercase"));
            }
        }
    }
    None
}

fn chain_feature(label: &str) -> SemanticFeature {
    let words: Vec<String> = label
        .split(|c: char| !c.is_alphanumeric())
        .flat_map(crate::extract::split_identifier)
        .collect();
    SemanticFeature::new(normalize_phrase(&words.join(" ")), words)
}

fn ensure_high_level(rpg: &mut Rpg, id: &str, label: &str) -> Result<()> {
    if rpg.store().get_node(id)?.is_none() {
        rpg.add_high_level_node(HighLevelNodeArgs {
            id: id.to_string(),
            feature: chain_feature(label),
            directory_path: None,
        })?;
    }
    Ok(())
}

/// Apply an assignment: create chain nodes, chain edges, and
/// subcategory→file edges; attach leftovers under `Uncategorized`.
pub fn apply_assignment(
    rpg: &mut Rpg,
    assignment: &BTreeMap<String, Vec<String>>,
    groups: &[FileFeatureGroup],
) -> Result<ReorganizeSummary> {
    let mut summary = ReorganizeSummary::default();

    for (path, labels) in assignment {
        let segments: Vec<&str> = path.split('/').collect();
        let [area, category, subcategory] = segments.as_slice() else {
            continue;
        };
        let area_id = format!("domain:{area}");
        let category_id = format!("domain:{area}/{category}");
        let subcategory_id = format!("domain:{area}/{category}/{subcategory}");

        ensure_high_level(rpg, &area_id, area)?;
        ensure_high_level(rpg, &category_id, category)?;
        ensure_high_level(rpg, &subcategory_id, subcategory)?;
        rpg.add_functional_edge(&area_id, &category_id)?;
        rpg.add_functional_edge(&category_id, &subcategory_id)?;
        summary.chains += 1;

        for label in labels {
            let Some(group) = groups.iter().find(|g| &g.label == label) else {
                tracing::warn!("assignment references unknown group '{label}'");
                continue;
            };
            for file in &group.files {
                // First assignment wins; the hierarchy stays a forest.
                if rpg.store().get_parent(&file.file_id)?.is_none() {
                    rpg.add_functional_edge(&subcategory_id, &file.file_id)?;
                    summary.attached_files += 1;
                }
            }
        }
    }

    // Any file the assignment left orphaned lands under Uncategorized.
    let mut orphans = Vec::new();
    for group in groups {
        for file in &group.files {
            if rpg.store().get_parent(&file.file_id)?.is_none() {
                orphans.push(file.file_id.clone());
            }
        }
    }
    if !orphans.is_empty() {
        let id = format!("domain:{UNCATEGORIZED}");
        ensure_high_level(rpg, &id, UNCATEGORIZED)?;
        for orphan in orphans {
            rpg.add_functional_edge(&id, &orphan)?;
            summary.uncategorized_files += 1;
        }
    }

    summary.areas = rpg.hierarchy_roots()?.len();
    Ok(summary)
}

/// Full reorganization pass: discovery, construction, application.
pub async fn reorganize(
    rpg: &mut Rpg,
    llm: &dyn LlmClient,
    deadline: Duration,
) -> Result<ReorganizeSummary> {
    let groups = group_files_by_top_dir(rpg)?;
    if groups.is_empty() {
        return Ok(ReorganizeSummary::default());
    }
    let areas = discover_domains(llm, &groups, deadline).await?;
    tracing::info!(areas = areas.len(), "discovered functional areas");
    let assignment = construct_hierarchy(llm, &areas, &groups, deadline).await?;
    apply_assignment(rpg, &assignment, &groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_normalization() {
        assert_eq!(pascal_case("data processing"), "DataProcessing");
        assert_eq!(pascal_case("auth"), "Auth");
        assert_eq!(pascal_case("Already-Pascal"), "AlreadyPascal");
    }

    #[test]
    fn area_validation_dedupes() {
        let areas = validate_areas(vec![
            "DataProcessing".to_string(),
            "data processing".to_string(),
            "".to_string(),
        ]);
        assert_eq!(areas, vec!["DataProcessing"]);
    }

    #[test]
    fn assignment_validation_requires_three_lowercase_levels() {
        let mut good = BTreeMap::new();
        good.insert(
            "Auth/credential validation/token check".to_string(),
            vec!["auth".to_string()],
        );
        assert!(validate_assignment(&good).is_none());

        let mut two_levels = BTreeMap::new();
        two_levels.insert("Auth/token check".to_string(), vec![]);
        assert!(validate_assignment(&two_levels).is_some());

        let mut uppercase = BTreeMap::new();
        uppercase.insert("Auth/Credential Validation/token check".to_string(), vec![]);
        assert!(validate_assignment(&uppercase).is_some());
    }

    #[test]
    fn top_level_dir_groups() {
        assert_eq!(top_level_dir("src/a.ts"), "src");
        assert_eq!(top_level_dir("main.py"), "root");
    }
}
