use serenity::{
    all::ButtonStyle,
    builder::{
        CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind,
        CreateSelectMenuOption,
    },
};

use crate::audio::{commands::PlayerAction, session::SessionSnapshot, track::truncate_title};

/// IDs personalizados para los controles del mensaje de estado
pub mod button_ids {
    pub const PLAY_RESUME: &str = "player_play";
    pub const PAUSE: &str = "player_pause";
    pub const STOP: &str = "player_stop";
    pub const NEXT: &str = "player_next";
    pub const LOOP: &str = "player_loop";
    pub const REMOVE_SELECT: &str = "player_remove";
}

/// Límite de opciones de un menú de selección de Discord
pub const MAX_SELECT_OPTIONS: usize = 25;

/// Límite de etiqueta usado en las opciones del menú
pub const MAX_OPTION_LABEL: usize = 90;

/// Controles del reproductor: fila de botones + menú para quitar canciones
pub fn create_player_controls(snapshot: &SessionSnapshot) -> Vec<CreateActionRow> {
    let loop_style = if snapshot.looping {
        ButtonStyle::Success
    } else {
        ButtonStyle::Secondary
    };

    let buttons = vec![
        CreateButton::new(button_ids::PLAY_RESUME)
            .emoji('▶')
            .style(ButtonStyle::Success)
            .disabled(!snapshot.paused && snapshot.current.is_some()),
        CreateButton::new(button_ids::PAUSE)
            .emoji('⏸')
            .style(ButtonStyle::Primary)
            .disabled(snapshot.paused),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
        CreateButton::new(button_ids::NEXT)
            .emoji('⏭')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LOOP)
            .emoji('🔁')
            .style(loop_style),
    ];

    let mut rows = vec![CreateActionRow::Buttons(buttons)];

    // Discord exige al menos una opción en un menú
    let options = remove_options(snapshot);
    if !options.is_empty() {
        let menu = CreateSelectMenu::new(
            button_ids::REMOVE_SELECT,
            CreateSelectMenuKind::String { options },
        )
        .placeholder("🗑️ Quitar una canción de la cola");
        rows.push(CreateActionRow::SelectMenu(menu));
    }

    rows
}

fn remove_options(snapshot: &SessionSnapshot) -> Vec<CreateSelectMenuOption> {
    snapshot
        .queue
        .iter()
        .take(MAX_SELECT_OPTIONS)
        .enumerate()
        .map(|(i, track)| {
            CreateSelectMenuOption::new(remove_label(i, track.title()), i.to_string())
        })
        .collect()
}

/// Etiqueta de una opción del menú: "N. título", recortada a [`MAX_OPTION_LABEL`]
pub fn remove_label(index: usize, title: &str) -> String {
    truncate_title(&format!("{}. {}", index + 1, title), MAX_OPTION_LABEL)
}

/// Traduce el `custom_id` (y los valores del menú) a una acción
pub fn parse_action(custom_id: &str, values: &[String]) -> Option<PlayerAction> {
    match custom_id {
        button_ids::PLAY_RESUME => Some(PlayerAction::PlayResume),
        button_ids::PAUSE => Some(PlayerAction::Pause),
        button_ids::STOP => Some(PlayerAction::Stop),
        button_ids::NEXT => Some(PlayerAction::Next),
        button_ids::LOOP => Some(PlayerAction::ToggleLoop),
        button_ids::REMOVE_SELECT => values
            .first()
            .and_then(|v| v.parse::<usize>().ok())
            .map(PlayerAction::RemoveTrack),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn buttons_map_to_actions() {
        assert_eq!(parse_action("player_play", &[]), Some(PlayerAction::PlayResume));
        assert_eq!(parse_action("player_pause", &[]), Some(PlayerAction::Pause));
        assert_eq!(parse_action("player_stop", &[]), Some(PlayerAction::Stop));
        assert_eq!(parse_action("player_next", &[]), Some(PlayerAction::Next));
        assert_eq!(parse_action("player_loop", &[]), Some(PlayerAction::ToggleLoop));
        assert_eq!(parse_action("otra_cosa", &[]), None);
    }

    #[test]
    fn remove_select_carries_index() {
        let values = vec!["3".to_string()];
        assert_eq!(
            parse_action("player_remove", &values),
            Some(PlayerAction::RemoveTrack(3))
        );
        assert_eq!(parse_action("player_remove", &["x".to_string()]), None);
        assert_eq!(parse_action("player_remove", &[]), None);
    }

    #[test]
    fn option_labels_are_bounded() {
        let label = remove_label(0, &"a".repeat(200));
        assert_eq!(label.chars().count(), MAX_OPTION_LABEL);
        assert!(label.starts_with("1. aaa"));
        assert_eq!(remove_label(4, "Song"), "5. Song");
    }
}
