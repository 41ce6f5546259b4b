use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use console::style;
use drover::models::message::{Message, MessageContent};

const THEME: &str = "zenburn";

fn print_tool_request(content: &str, tool_name: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes()).name(format!("Tool Request: {}", tool_name)),
        )
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

fn print_tool_response(content: &str, tool_name: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes())
                .name(format!("Tool Response: {}", tool_name)),
        )
        .theme(THEME)
        .language("Markdown")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

fn print(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

/// Print one conversation message to stdout
pub fn render(message: &Message) -> Result<()> {
    match &message.content {
        MessageContent::Text(text) => print(&text.text)?,
        MessageContent::ToolUse(tool_use) => {
            print_tool_request(&serde_json::to_string_pretty(&tool_use.input)?, &tool_use.name)?
        }
        MessageContent::ToolResult(result) if result.is_error => {
            println!(
                "{} {}",
                style(format!("{} failed:", result.tool_name)).red().bold(),
                result.content
            );
        }
        MessageContent::ToolResult(result) => print_tool_response(&result.content, &result.tool_name)?,
    }

    println!();
    io::stdout().flush()?;
    Ok(())
}
