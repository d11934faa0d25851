//! The `studyquiz grades` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use studyquiz_core::model::CourseId;

use super::{format_grade, Workspace};

pub fn execute(course: String, config_path: Option<PathBuf>, state_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;
    let registry = workspace.engine.registry();
    let course = CourseId::new(course);

    let items = registry.items(&course)?;
    if items.is_empty() {
        println!("No coursework for course {course}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Weight", "Grade", "Quiz"]);
    for item in &items {
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(&item.name),
            Cell::new(format!("{:.1}%", item.weight * 100.0)),
            Cell::new(format_grade(item.grade)),
            Cell::new(item.quiz_id.map(|q| q.to_string()).unwrap_or_default()),
        ]);
    }
    println!("{table}");

    let grade = registry.course_grade(&course)?;
    println!(
        "\nFinal grade: {:.1} ({} graded, {} ungraded, weights total {:.1}%)",
        grade.final_grade,
        grade.graded_items,
        grade.ungraded_items,
        grade.total_weight * 100.0
    );
    if let Some(projected) = grade.projected() {
        if grade.ungraded_items > 0 {
            println!("Projected at current average: {projected:.1}");
        }
    }

    Ok(())
}
