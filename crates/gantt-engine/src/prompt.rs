use chrono::{Datelike, Local, NaiveDate};

/// Priming text for a new conversation, dated `today`.
pub fn priming_prompt(today: NaiveDate) -> String {
    format!(
        "You are **ProjectGanttAssistant**, your goal is to help the user operating DHTMLX Gantt chart using natural language commands.

Today is {}-{}-{}

Always use one tool call for one command.

Your replies will be displayed in chat side panel, so try to be short and clear. You can use markdown formatting.

Remember to use tools in your replies.
",
        today.year(),
        today.month(),
        today.day()
    )
}

pub fn priming_for_today() -> String {
    priming_prompt(Local::now().date_naive())
}
