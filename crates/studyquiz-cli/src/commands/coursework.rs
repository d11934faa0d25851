//! The `studyquiz coursework` command family.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use studyquiz_core::model::{CourseId, CourseworkId, CourseworkItem};

use super::{format_grade, parse_quiz_id, Workspace};

#[derive(Subcommand)]
pub enum Action {
    /// Add a weighted item to a course
    Add {
        #[arg(long)]
        course: String,

        #[arg(long)]
        name: String,

        /// Fraction of the final grade, in (0, 1]
        #[arg(long)]
        weight: f64,
    },

    /// Change an item's weight
    UpdateWeight {
        #[arg(long)]
        item: String,

        #[arg(long)]
        weight: f64,
    },

    /// Rename an item
    Rename {
        #[arg(long)]
        item: String,

        #[arg(long)]
        name: String,
    },

    /// Remove an item
    Remove {
        #[arg(long)]
        item: String,
    },

    /// Record the first grade of an item
    Grade {
        #[arg(long)]
        item: String,

        /// Percentage in [0, 100]
        #[arg(long)]
        grade: f64,
    },

    /// Overwrite an item's existing grade
    EditGrade {
        #[arg(long)]
        item: String,

        #[arg(long)]
        grade: f64,
    },

    /// Grade an item by a quiz of the same course
    LinkQuiz {
        #[arg(long)]
        item: String,

        #[arg(long)]
        quiz: String,
    },
}

pub fn execute(action: Action, config_path: Option<PathBuf>, state_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;
    let registry = workspace.engine.registry();

    match action {
        Action::Add {
            course,
            name,
            weight,
        } => {
            let item = registry.add_item(&CourseId::new(course), &name, weight)?;
            workspace.save()?;
            println!("Added '{}' (weight {}) to course {}", item.name, item.weight, item.course_id);
            println!("Item id: {}", item.id);
        }
        Action::UpdateWeight { item, weight } => {
            let item = registry.update_weight(parse_item_id(&item)?, weight)?;
            workspace.save()?;
            print_item("Updated", &item);
        }
        Action::Rename { item, name } => {
            let item = registry.rename_item(parse_item_id(&item)?, &name)?;
            workspace.save()?;
            print_item("Renamed", &item);
        }
        Action::Remove { item } => {
            let id = parse_item_id(&item)?;
            match registry.remove_item(id)? {
                Some(removed) => {
                    workspace.save()?;
                    print_item("Removed", &removed);
                }
                None => println!("No coursework item {id}; nothing removed."),
            }
        }
        Action::Grade { item, grade } => {
            let item = registry.record_grade(parse_item_id(&item)?, grade)?;
            workspace.save()?;
            print_item("Graded", &item);
        }
        Action::EditGrade { item, grade } => {
            let item = registry.edit_grade(parse_item_id(&item)?, grade)?;
            workspace.save()?;
            print_item("Regraded", &item);
        }
        Action::LinkQuiz { item, quiz } => {
            let item = workspace
                .engine
                .link_quiz(parse_item_id(&item)?, parse_quiz_id(&quiz)?)?;
            workspace.save()?;
            print_item("Linked", &item);
        }
    }

    Ok(())
}

fn parse_item_id(raw: &str) -> Result<CourseworkId> {
    raw.parse()
        .with_context(|| format!("invalid coursework item id: {raw}"))
}

fn print_item(verb: &str, item: &CourseworkItem) {
    println!(
        "{verb} '{}': weight {}, grade {}",
        item.name,
        item.weight,
        format_grade(item.grade)
    );
}
