use clap::Subcommand;
use task_api::types::project::{parse_tech_stack, NewProject, ProjectContext};

use crate::context::Context;
use crate::render;
use crate::util::confirm;

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// List all projects
    List,
    /// Show a single project
    Show { project_id: String },
    /// Register a repository as a new project
    Create {
        #[clap(long)]
        name: String,
        /// Git URL the orchestrator clones from
        #[clap(long)]
        repo_url: String,
        #[clap(long)]
        description: Option<String>,
        /// Comma-separated list, e.g. "rust, axum, postgres"
        #[clap(long)]
        tech_stack: Option<String>,
        #[clap(long)]
        coding_style: Option<String>,
        #[clap(long)]
        test_framework: Option<String>,
    },
    /// Delete a project
    Delete {
        project_id: String,
        /// Do not ask for confirmation
        #[clap(long)]
        yes: bool,
    },
}

pub async fn run(ctx: &Context, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => {
            let projects = ctx.client.list_projects().await?;
            if ctx.json {
                return ctx.print_json(&projects);
            }
            if projects.is_empty() {
                println!("No projects yet. Create one with `conductor projects create`.");
            }
            for project in &projects {
                println!("{}", render::project_row(project));
            }
        }
        ProjectCommand::Show { project_id } => {
            let project = ctx.client.get_project(&project_id).await?;
            let tasks = ctx.client.list_tasks(Some(project.id.as_str())).await?;
            if ctx.json {
                return ctx.print_json(&serde_json::json!({
                    "project": project,
                    "tasks": tasks,
                }));
            }
            println!("{}", render::project(&project));
            println!();
            if tasks.is_empty() {
                println!("No tasks yet.");
            } else {
                println!("Tasks:");
                for task in &tasks {
                    println!("  {}", render::task_row(task));
                }
            }
        }
        ProjectCommand::Create {
            name,
            repo_url,
            description,
            tech_stack,
            coding_style,
            test_framework,
        } => {
            let context = ProjectContext {
                tech_stack: tech_stack.as_deref().map(parse_tech_stack).unwrap_or_default(),
                coding_style,
                test_framework,
            };
            let new_project = NewProject {
                name,
                repository_url: repo_url,
                description,
                context: (!context.is_empty()).then_some(context),
            };
            let project = ctx.client.create_project(&new_project).await?;
            log::info!("Created project {}", project.id);
            if ctx.json {
                return ctx.print_json(&project);
            }
            println!("Created project {} ({})", project.name, project.id);
        }
        ProjectCommand::Delete { project_id, yes } => {
            if !yes && !confirm(&format!("Delete project {project_id}?"))? {
                println!("Aborted.");
                return Ok(());
            }
            ctx.client.delete_project(&project_id).await?;
            println!("Deleted project {project_id}");
        }
    }
    Ok(())
}
