use crate::application::console::Console;
use crate::domain::models::ProjectMap;

/// Chooses a project for `task`.
///
/// The allow-list narrows the candidates (all projects when nothing matches). A single
/// candidate is taken without asking. Anything but a valid menu number means no project.
pub fn pick_project(
    console: &mut dyn Console,
    projects: &ProjectMap,
    allow_list: &[String],
    task: &str,
) -> Option<u64> {
    if projects.is_empty() {
        return None;
    }
    let candidates = projects.restricted_to(allow_list);
    if let [only] = candidates.as_slice() {
        return Some(only.id);
    }

    console.say("");
    console.say(&format!("  Project for '{task}':"));
    for (index, project) in candidates.iter().enumerate() {
        console.say(&format!("    [{}] {}", index + 1, project.name));
    }
    console.say("    [0] No project");

    let choice = console.ask("  Choice: ");
    match choice.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(index) => candidates.get(index - 1).map(|project| project.id),
    }
}
