//! Stage one: role and background, then question generation.

use std::{path::Path, time::Instant};

use anyhow::{Result, bail};
use charisma_core::{
    ApiClient, FormController, FormError, InterviewSession, PRESET_ROLES, ResumeFile,
    RoleSelection, format_questions, form::MIN_DESCRIPTION_CHARS,
};
use console::style;

use crate::ui::{self, Prompt};

/// Answers already given on the command line.
#[derive(Debug, Default)]
pub struct FormArgs<'a> {
    pub preset: Option<&'a str>,
    pub custom: bool,
    pub custom_role: Option<&'a str>,
    pub resume: Option<&'a Path>,
    pub description: Option<&'a str>,
}

/// Accepts a number from the role menu, `custom`, or any other text as a custom role.
fn apply_role_answer(form: &mut FormController, answer: &str) -> Result<bool> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(false);
    }
    if let Ok(n) = answer.parse::<usize>() {
        match n {
            n if (1..=PRESET_ROLES.len()).contains(&n) => form.select_preset(PRESET_ROLES[n - 1]),
            n if n == PRESET_ROLES.len() + 1 => form.select_custom(),
            _ => return Ok(false),
        }
        return Ok(true);
    }
    form.select_role(answer);
    if let Some(preset) = PRESET_ROLES.iter().find(|r| r.eq_ignore_ascii_case(answer)) {
        form.select_preset(preset);
    } else if !matches!(form.role_selection(), RoleSelection::Custom(_)) {
        form.select_custom();
        form.set_custom_role(answer)?;
    }
    Ok(true)
}

async fn ask_role(form: &mut FormController, prompt: &mut Prompt) -> Result<()> {
    if matches!(form.role_selection(), RoleSelection::Custom(None)) {
        let text = prompt.ask("Custom role:").await?;
        form.set_custom_role(&text)?;
        return Ok(());
    }

    println!("{}", style("Target role").bold());
    for (i, role) in PRESET_ROLES.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, role);
    }
    println!("  {:>2}. {}", PRESET_ROLES.len() + 1, style("Custom role...").dim());

    let answer = prompt.ask("Role (number or name):").await?;
    if !apply_role_answer(form, &answer)? {
        ui::alert(FormError::MissingRole);
    }
    Ok(())
}

async fn ask_resume(form: &mut FormController, prompt: &mut Prompt) -> Result<()> {
    let answer = prompt.ask("Path to your résumé (PDF):").await?;
    let path = unquote(&answer);
    if path.is_empty() {
        return Ok(());
    }
    match ResumeFile::from_path(Path::new(path)).await {
        Ok(file) => {
            ui::success(format!("Attached {}", style(&file.file_name).dim()));
            form.attach_resume(file);
        }
        Err(e) => ui::alert(e),
    }
    Ok(())
}

async fn ask_description(form: &mut FormController, prompt: &mut Prompt) -> Result<()> {
    let answer = prompt
        .ask(&format!(
            "Describe your background (more than {MIN_DESCRIPTION_CHARS} characters):"
        ))
        .await?;
    form.set_description(answer);
    Ok(())
}

async fn ask_background(form: &mut FormController, prompt: &mut Prompt) -> Result<()> {
    match prompt
        .choose("Background from [r]ésumé or [d]escription?", &['r', 'd'])
        .await?
    {
        'r' => {
            form.use_resume();
            if form.resume().is_none() {
                ask_resume(form, prompt).await?;
            }
        }
        _ => {
            form.use_description();
            ask_description(form, prompt).await?;
        }
    }
    Ok(())
}

/// Fills the form from `args`, prompting for whatever still blocks submission.
pub async fn fill_form(args: FormArgs<'_>, prompt: &mut Prompt) -> Result<FormController> {
    let mut form = FormController::new();

    if let Some(preset) = args.preset {
        form.select_preset(preset);
    }
    if args.custom || args.custom_role.is_some() {
        form.select_custom();
    }
    if let Some(text) = args.custom_role {
        form.set_custom_role(text)?;
    }
    if let Some(path) = args.resume {
        form.use_resume();
        form.attach_resume(ResumeFile::from_path(path).await?);
    }
    if let Some(text) = args.description {
        form.use_description();
        form.set_description(text);
    }

    loop {
        match form.submit_request() {
            Ok(_) => return Ok(form),
            Err(FormError::MissingRole) => ask_role(&mut form, prompt).await?,
            Err(FormError::MissingResume) => ask_background(&mut form, prompt).await?,
            Err(e @ FormError::DescriptionTooShort { .. }) => {
                ui::alert(e);
                ask_description(&mut form, prompt).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Submits the form until questions come back or the user gives up.
pub async fn generate(
    form: &mut FormController,
    api: &ApiClient,
    prompt: &mut Prompt,
) -> Result<InterviewSession> {
    loop {
        let step_start = Instant::now();
        let spinner = ui::create_spinner("Generating interview questions...");
        match form.submit(api).await {
            Ok(session) => {
                spinner.finish_with_message(format!(
                    "{} Generated {} questions for {} {}",
                    style("✓").green().bold(),
                    session.questions.len(),
                    style(session.role()).cyan(),
                    style(format!("[{}]", ui::format_duration(step_start.elapsed()))).dim()
                ));
                return Ok(session);
            }
            Err(e) if e.is_validation() => {
                spinner.finish_and_clear();
                return Err(e.into());
            }
            Err(e) => {
                spinner.finish_and_clear();
                ui::error(&e);
                if !prompt.confirm("Try again?").await? {
                    bail!("no interview questions were generated");
                }
            }
        }
    }
}

pub fn print_questions(session: &InterviewSession) {
    ui::rule();
    println!("{}\n", style("Answer these questions:").bold());
    println!("{}", format_questions(&session.questions));
    ui::rule();
}

/// Strips the quotes terminals add around dragged-in paths.
pub fn unquote(input: &str) -> &str {
    input.trim().trim_matches(|c| c == '\'' || c == '"')
}
