//! Render submit files with TinyTemplate
//!
//! Every backend ships a template under `data/templates/`. Files are staged into the job's working
//! directory, so templates refer to them by file name only.

use log::debug;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::Result;
use crate::job::JobDescriptor;

/// Rendering context shared by all submit file templates
#[derive(Serialize, Debug)]
pub struct SubmitContext {
    job_id: String,
    job_name: String,
    executable: String,
    arguments: String,
    input_files: String,
    output_files: String,
    has_input_files: bool,
    has_output_files: bool,
    has_tasks: bool,
    queue_count: u32,
}

impl SubmitContext {
    pub fn new(job: &JobDescriptor) -> SubmitContext {
        let input_files: Vec<String> = job.input_files().iter().map(|f| f.file_name()).collect();
        SubmitContext {
            job_id: job.id().to_string(),
            // PBS job names are limited to 15 characters
            job_name: job.id().chars().take(15).collect(),
            executable: job
                .executable()
                .map(|f| format!("./{}", f.file_name()))
                .unwrap_or_default(),
            arguments: job.arguments().to_string(),
            has_input_files: !input_files.is_empty(),
            input_files: input_files.join(","),
            has_output_files: !job.output_files().is_empty(),
            output_files: job.output_files().join(","),
            has_tasks: job.is_task_parallel(),
            queue_count: job.num_tasks().max(1),
        }
    }
}

/// Render a submit file template for a job
pub fn render(name: &str, template: &str, job: &JobDescriptor) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template(name, template)?;
    let context = SubmitContext::new(job);
    debug!("Rendering {} submit file for {}", name, job.id());
    Ok(tt.render(name, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_not_html_escaped() {
        let job = JobDescriptor::builder()
            .id("job-1")
            .executable("/opt/bin/run.sh", false, "--in a&b <x>")
            .unwrap()
            .build()
            .unwrap();
        let rendered = render("t", "{executable} {arguments}", &job).unwrap();
        assert_eq!(rendered, "./run.sh --in a&b <x>");
    }
}
