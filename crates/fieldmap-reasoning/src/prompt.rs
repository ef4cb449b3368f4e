//! Prompt construction for batched field disambiguation.

use fieldmap_model::EntitySchema;

use crate::escalator::AmbiguousField;

/// Builds one prompt covering every field in the batch.
///
/// Each field lists at most `max_candidates` targets (name, similarity,
/// description) and at most `max_samples` sample values. The model is asked
/// for a bare JSON array, one object per field.
pub fn build_prompt(
    schema: &EntitySchema,
    fields: &[AmbiguousField],
    max_candidates: usize,
    max_samples: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You map columns of an uploaded \"{}\" dataset onto a fixed target schema.\n",
        schema.entity()
    ));
    prompt.push_str(
        "For each source column below, pick the single best target from its candidate list, \
         or null if none fits.\n\n",
    );

    for (position, field) in fields.iter().enumerate() {
        prompt.push_str(&format!("{}. Source column: \"{}\"\n", position + 1, field.source.name));
        if let Some(column_type) = field.source.column_type {
            prompt.push_str(&format!("   Detected type: {column_type}\n"));
        }
        let samples: Vec<&str> = field
            .source
            .samples
            .iter()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .take(max_samples)
            .collect();
        if !samples.is_empty() {
            prompt.push_str(&format!("   Sample values: {}\n", quoted_list(&samples)));
        }
        prompt.push_str("   Candidates:\n");
        for candidate in field.candidates.iter().take(max_candidates) {
            let definition = schema.field(&candidate.target_field);
            let description = definition
                .map(|d| d.description.trim())
                .filter(|d| !d.is_empty())
                .unwrap_or("no description");
            let data_type = definition.map_or("string", |d| d.data_type.as_str());
            prompt.push_str(&format!(
                "   - {} ({data_type}, similarity {:.2}): {description}\n",
                candidate.target_field, candidate.confidence
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Respond with ONLY a JSON array, no prose and no code fences. One element per source \
         column, in this shape:\n\
         [{\"source\": \"<source column>\", \"target\": \"<candidate name or null>\", \
         \"confidence\": <number between 0.50 and 0.90>, \"reasoning\": \"<one short sentence>\"}]\n\
         Only use target names from that column's candidate list.\n",
    );
    prompt
}

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "'")))
        .collect::<Vec<_>>()
        .join(", ")
}
