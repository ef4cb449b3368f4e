use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use fieldmap_map::{ConfidenceLevel, EntityScore, MappingOutcome, MatchThresholds};
use fieldmap_model::{CandidateMatch, EntitySchema, Mapping, MatchMethod};

pub fn print_mapping(outcome: &MappingOutcome, thresholds: &MatchThresholds) {
    println!("Entity: {}", outcome.entity);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Target"),
        header_cell("Confidence"),
        header_cell("Method"),
        header_cell("Alternatives"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for mapping in &outcome.mappings {
        table.add_row(vec![
            Cell::new(&mapping.source),
            target_cell(mapping),
            confidence_cell(mapping, thresholds),
            method_cell(mapping.method),
            Cell::new(alternatives_text(&mapping.alternatives)).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");

    let stats = &outcome.stats;
    let mut totals = Table::new();
    totals.set_header(vec![
        header_cell("Total"),
        header_cell("Mapped"),
        header_cell("Exact"),
        header_cell("Alias"),
        header_cell("Vector"),
        header_cell("Reasoning"),
        header_cell("Fallback"),
        header_cell("Lexical"),
        header_cell("Manual"),
        header_cell("Auto-approved"),
    ]);
    apply_table_style(&mut totals);
    totals.add_row(vec![
        Cell::new(stats.total).add_attribute(Attribute::Bold),
        Cell::new(stats.mapped),
        Cell::new(stats.exact),
        Cell::new(stats.alias),
        Cell::new(stats.vector),
        Cell::new(stats.reasoning),
        Cell::new(stats.vector_fallback),
        Cell::new(stats.lexical),
        count_cell(stats.manual, Color::Yellow),
        Cell::new(format!("{:.0}%", stats.auto_approval_rate * 100.0)),
    ]);
    println!("{totals}");

    let counts = outcome.count_by_level(thresholds);
    if !counts.is_empty() {
        let mut levels = Table::new();
        levels.set_header(vec![header_cell("Level"), header_cell("Mappings"), header_cell("Meaning")]);
        apply_table_style(&mut levels);
        align_column(&mut levels, 1, CellAlignment::Right);
        for (level, count) in counts.iter().rev() {
            levels.add_row(vec![
                level_cell(*level),
                Cell::new(count),
                dim_cell(level.description()),
            ]);
        }
        println!("{levels}");
    }

    let manual: Vec<&str> = outcome.unmapped().collect();
    if !manual.is_empty() {
        println!("Needs manual mapping: {}", manual.join(", "));
    }
    if !stats.semantic_available {
        println!("Note: semantic matching was unavailable; results are lexical only.");
    }
    if stats.reasoning_requests > 0 || stats.reasoning_cache_hits > 0 {
        println!(
            "Reasoning: {} request(s), {} cache hit(s), {} failure(s)",
            stats.reasoning_requests, stats.reasoning_cache_hits, stats.reasoning_failures
        );
    }
}

pub fn print_entity_scores(scores: &[EntityScore]) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Entity"), header_cell("Score")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (rank, score) in scores.iter().enumerate() {
        let entity = if rank == 0 {
            Cell::new(&score.entity).fg(Color::Blue).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&score.entity)
        };
        table.add_row(vec![entity, Cell::new(format!("{:.3}", score.score))]);
    }
    println!("{table}");
}

pub fn print_candidates(source: &str, candidates: &[CandidateMatch]) {
    println!("Suggestions for {source}:");
    let mut table = Table::new();
    table.set_header(vec![header_cell("Target"), header_cell("Confidence"), header_cell("Method")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for candidate in candidates {
        table.add_row(vec![
            Cell::new(&candidate.target_field),
            Cell::new(format!("{:.3}", candidate.confidence)),
            method_cell(candidate.method),
        ]);
    }
    println!("{table}");
}

pub fn print_schemas<'a>(schemas: impl Iterator<Item = &'a EntitySchema>) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Entity"),
        header_cell("Fields"),
        header_cell("Required"),
        header_cell("Fingerprint"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for schema in schemas {
        let fingerprint = schema.fingerprint();
        table.add_row(vec![
            Cell::new(schema.entity()).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(schema.len()),
            Cell::new(schema.required_fields().count()),
            Cell::new(fingerprint.get(..12).unwrap_or(&fingerprint)).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
}

fn target_cell(mapping: &Mapping) -> Cell {
    match &mapping.target {
        Some(target) => Cell::new(target).fg(Color::Green),
        None => dim_cell("(manual)"),
    }
}

fn confidence_cell(mapping: &Mapping, thresholds: &MatchThresholds) -> Cell {
    if !mapping.is_mapped() {
        return dim_cell("-");
    }
    let text = format!("{:.2}", mapping.confidence);
    match thresholds.categorize(mapping.confidence) {
        Some(ConfidenceLevel::High) => Cell::new(text).fg(Color::Green),
        Some(ConfidenceLevel::Medium) => Cell::new(text).fg(Color::Yellow),
        Some(ConfidenceLevel::Low) | None => Cell::new(text).fg(Color::Red),
    }
}

fn level_cell(level: ConfidenceLevel) -> Cell {
    match level {
        ConfidenceLevel::High => Cell::new("high").fg(Color::Green),
        ConfidenceLevel::Medium => Cell::new("medium").fg(Color::Yellow),
        ConfidenceLevel::Low => Cell::new("low").fg(Color::Red),
    }
}

fn method_cell(method: MatchMethod) -> Cell {
    let cell = Cell::new(method.as_str());
    match method {
        MatchMethod::Exact | MatchMethod::Alias => cell.fg(Color::Green),
        MatchMethod::Reasoning | MatchMethod::VectorFallback => cell.fg(Color::Magenta),
        MatchMethod::Manual => cell.fg(Color::DarkGrey),
        _ => cell,
    }
}

fn alternatives_text(alternatives: &[CandidateMatch]) -> String {
    if alternatives.is_empty() {
        return "-".to_string();
    }
    alternatives
        .iter()
        .map(|c| format!("{} ({:.2})", c.target_field, c.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}
