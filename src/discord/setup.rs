//! Discord rendering of setup wizard replies.

use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption,
};

use crate::common::messages::ChannelCategory;
use crate::setup::wizard::{select_id, skip_id, CANCEL_ID, CONFIRM_ID};
use crate::setup::{SetupChoices, SetupStep, WizardReply};

/// Discord allows at most 25 options per select menu.
const MAX_SELECT_OPTIONS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Channel picker; options are `(channel_id, name)`.
    ChannelSelect {
        custom_id: String,
        options: Vec<(u64, String)>,
    },
    Buttons(Vec<(String, &'static str, ButtonKind)>),
}

/// A wizard message ready to send or edit in place.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardView {
    pub content: String,
    pub controls: Vec<Control>,
}

impl WizardView {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            controls: Vec::new(),
        }
    }

    pub fn components(&self) -> Vec<CreateActionRow> {
        self.controls
            .iter()
            .map(|control| match control {
                Control::ChannelSelect { custom_id, options } => {
                    let options = options
                        .iter()
                        .map(|(id, name)| CreateSelectMenuOption::new(format!("#{}", name), id.to_string()))
                        .collect();
                    CreateActionRow::SelectMenu(
                        CreateSelectMenu::new(custom_id, CreateSelectMenuKind::String { options })
                            .placeholder("Pick a channel"),
                    )
                }
                Control::Buttons(buttons) => CreateActionRow::Buttons(
                    buttons
                        .iter()
                        .map(|(custom_id, label, kind)| {
                            let style = match kind {
                                ButtonKind::Primary => ButtonStyle::Primary,
                                ButtonKind::Secondary => ButtonStyle::Secondary,
                                ButtonKind::Danger => ButtonStyle::Danger,
                            };
                            CreateButton::new(custom_id).label(*label).style(style)
                        })
                        .collect(),
                ),
            })
            .collect()
    }
}

/// Render a wizard reply. `text_channels` are the guild's text channels,
/// `(channel_id, name)`, in display order.
pub fn render_reply(reply: &WizardReply, text_channels: &[(u64, String)]) -> WizardView {
    match reply {
        WizardReply::Prompt { step, choices } => render_prompt(*step, choices, text_channels),
        WizardReply::Invalid { step, reason } => {
            WizardView::text(format!("{}\n{}", reason, step.prompt()))
        }
        WizardReply::Completed(settings) => WizardView::text(format!(
            "Setup saved. Relaying **{}** as **{}**; reconnecting now.",
            settings.archipelago.server, settings.archipelago.slot
        )),
        WizardReply::Failed { reason } => WizardView {
            content: format!("Could not save the settings: {}. Try again.", reason),
            controls: vec![confirm_buttons()],
        },
        WizardReply::Cancelled => WizardView::text("Setup cancelled."),
        WizardReply::Expired => {
            WizardView::text("This setup session has expired. Run `/setup` again.")
        }
        WizardReply::Ignored => WizardView::text(""),
    }
}

fn render_prompt(
    step: SetupStep,
    choices: &SetupChoices,
    text_channels: &[(u64, String)],
) -> WizardView {
    let mut content = String::new();
    if step == SetupStep::Confirm {
        content.push_str(&summary(choices));
        content.push('\n');
    }
    content.push_str(step.prompt());

    let mut controls = Vec::new();
    if step.category().is_some() {
        controls.push(Control::ChannelSelect {
            custom_id: select_id(step),
            options: text_channels
                .iter()
                .take(MAX_SELECT_OPTIONS)
                .cloned()
                .collect(),
        });
        let mut buttons = Vec::new();
        if step != SetupStep::ChatChannel {
            buttons.push((skip_id(step), "Skip", ButtonKind::Secondary));
        }
        buttons.push((CANCEL_ID.to_string(), "Cancel", ButtonKind::Danger));
        controls.push(Control::Buttons(buttons));
    } else if step == SetupStep::Confirm {
        controls.push(confirm_buttons());
    } else {
        controls.push(Control::Buttons(vec![(
            CANCEL_ID.to_string(),
            "Cancel",
            ButtonKind::Danger,
        )]));
    }

    WizardView { content, controls }
}

fn confirm_buttons() -> Control {
    Control::Buttons(vec![
        (CONFIRM_ID.to_string(), "Save", ButtonKind::Primary),
        (CANCEL_ID.to_string(), "Cancel", ButtonKind::Danger),
    ])
}

fn summary(choices: &SetupChoices) -> String {
    let mut lines: Vec<String> = ChannelCategory::ALL
        .iter()
        .map(|c| match choices.channels.get(*c) {
            Some(id) => format!("- {}: <#{}>", c, id),
            None => format!("- {}: not set", c),
        })
        .collect();
    lines.push(format!(
        "- server: {}",
        choices.server.as_deref().unwrap_or("not set")
    ));
    lines.push(format!(
        "- slot: {}",
        choices.slot.as_deref().unwrap_or("not set")
    ));
    let password = match choices.password.as_deref() {
        Some(p) if !p.is_empty() => "set",
        _ => "none",
    };
    lines.push(format!("- password: {}", password));
    lines.join("\n")
}
