// D-pad task picker
//
// While L1 is held, holding a D-pad direction previews the task mapped to it
// by showing its color on the LED (trigger off). Cross picks it. Letting go
// without picking hands the LED back to the active task.
//
// Held buttons are drained every tick like any other, so they only stay held
// while the gamepad keeps repeating them. A short grace period covers the gap
// between repeats; the menu stays open, and Cross still picks, until it runs
// out.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::input::{Button, InputSnapshot, Press};
use crate::peripherals::{Rgba, Trigger};
use crate::platform::Platform;

/// Ticks without a held direction before the menu closes
const GRACE_TICKS: u32 = 10;

const MODIFIER: Button = Button::L1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Checked in this order when several are held
    const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    fn button(self) -> Button {
        match self {
            Direction::North => Button::Up,
            Direction::East => Button::Right,
            Direction::South => Button::Down,
            Direction::West => Button::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Switch to the named task
    Pick(String),
    /// Closed without a pick; the LED needs restoring
    Dismiss,
}

struct Item {
    color: Rgba,
    task: String,
}

#[derive(Default)]
pub struct Menu {
    items: HashMap<Direction, Item>,
    dir: Option<Direction>,
    idle_ticks: u32,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, dir: Direction, color: Rgba, task: &str) {
        self.items.insert(
            dir,
            Item {
                color,
                task: task.to_string(),
            },
        );
    }

    pub fn open(&self) -> bool {
        self.dir.is_some()
    }

    fn held(input: &InputSnapshot) -> Option<Direction> {
        if input.buttons.get(MODIFIER) != Press::Held {
            return None;
        }
        Direction::ALL
            .into_iter()
            .find(|d| input.buttons.get(d.button()) == Press::Held)
    }

    /// Runs before the active task; consumes the buttons it acts on
    pub fn tick(
        &mut self,
        platform: &mut Platform,
        input: &mut InputSnapshot,
    ) -> Option<MenuAction> {
        match Self::held(input) {
            Some(dir) => {
                let item = self.items.get(&dir)?;
                self.idle_ticks = 0;

                if self.dir.is_none() {
                    platform.set_led_trigger(Trigger::None);
                }
                if self.dir != Some(dir) {
                    debug!("Menu preview: {}", item.task);
                    platform.set_led_color(item.color);
                    self.dir = Some(dir);
                }
                input.buttons.take_held(MODIFIER);
                input.buttons.take_held(dir.button());
            }
            None => {
                self.dir?;
                self.idle_ticks += 1;
                if self.idle_ticks >= GRACE_TICKS {
                    debug!("Menu closed");
                    self.dir = None;
                    return Some(MenuAction::Dismiss);
                }
            }
        }

        // Open from here on; Cross picks whatever is being previewed
        let item = self.dir.and_then(|dir| self.items.get(&dir))?;
        if !input.buttons.take_pressed(Button::Cross) {
            return None;
        }
        info!("Menu pick: {}", item.task);
        Some(MenuAction::Pick(item.task.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::testing::robot;

    const RED: Rgba = Rgba::new(0xff, 0, 0, 0x80);
    const BLUE: Rgba = Rgba::new(0, 0, 0xff, 0x80);

    fn menu() -> Menu {
        let mut menu = Menu::new();
        menu.add_item(Direction::North, RED, "line");
        menu.add_item(Direction::East, BLUE, "square");
        menu
    }

    fn holding(buttons: &[Button]) -> InputSnapshot {
        let mut input = InputSnapshot::default();
        for b in buttons {
            input.buttons.set(*b, Press::Held);
        }
        input
    }

    #[test]
    fn test_direction_without_modifier_ignored() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();
        let mut input = holding(&[Button::Up]);
        input.buttons.set(Button::Cross, Press::Pressed);

        assert_eq!(menu.tick(&mut robot.platform, &mut input), None);
        assert!(!menu.open());
        // Left for the active task
        assert_eq!(input.buttons.get(Button::Cross), Press::Pressed);
        assert_eq!(input.buttons.get(Button::Up), Press::Held);
    }

    #[test]
    fn test_preview_then_pick() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();

        let mut input = holding(&[Button::L1, Button::Up]);
        assert_eq!(menu.tick(&mut robot.platform, &mut input), None);
        assert!(menu.open());
        assert_eq!(robot.platform.led().color(), RED);
        assert_eq!(robot.platform.led().trigger(), Trigger::None);
        assert_eq!(input.buttons.get(Button::Up), Press::None);

        let mut input = holding(&[Button::L1, Button::Right]);
        menu.tick(&mut robot.platform, &mut input);
        assert_eq!(robot.platform.led().color(), BLUE);

        let mut input = holding(&[Button::L1, Button::Right]);
        input.buttons.set(Button::Cross, Press::Pressed);
        assert_eq!(
            menu.tick(&mut robot.platform, &mut input),
            Some(MenuAction::Pick("square".to_string()))
        );
        assert_eq!(input.buttons.get(Button::Cross), Press::None);
    }

    #[test]
    fn test_unmapped_direction_does_nothing() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();
        let mut input = holding(&[Button::L1, Button::Down]);

        assert_eq!(menu.tick(&mut robot.platform, &mut input), None);
        assert!(!menu.open());
        assert_eq!(robot.platform.led().trigger(), Trigger::Heartbeat);
    }

    #[test]
    fn test_release_dismisses_after_grace() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();
        menu.tick(&mut robot.platform, &mut holding(&[Button::L1, Button::Up]));

        for _ in 1..GRACE_TICKS {
            assert_eq!(menu.tick(&mut robot.platform, &mut InputSnapshot::default()), None);
        }
        assert_eq!(
            menu.tick(&mut robot.platform, &mut InputSnapshot::default()),
            Some(MenuAction::Dismiss)
        );
        assert!(!menu.open());

        // Closed menus stay quiet
        assert_eq!(menu.tick(&mut robot.platform, &mut InputSnapshot::default()), None);
    }

    #[test]
    fn test_repeat_within_grace_keeps_open() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();
        menu.tick(&mut robot.platform, &mut holding(&[Button::L1, Button::Up]));

        for _ in 0..3 {
            for _ in 1..GRACE_TICKS {
                menu.tick(&mut robot.platform, &mut InputSnapshot::default());
            }
            menu.tick(&mut robot.platform, &mut holding(&[Button::L1, Button::Up]));
        }
        assert!(menu.open());
    }

    #[test]
    fn test_cross_within_grace_picks_preview() {
        let (_mock, mut robot) = robot();
        let mut menu = menu();
        menu.tick(&mut robot.platform, &mut holding(&[Button::L1, Button::Up]));
        menu.tick(&mut robot.platform, &mut InputSnapshot::default());

        let mut input = InputSnapshot::default();
        input.buttons.set(Button::Cross, Press::Pressed);
        assert_eq!(
            menu.tick(&mut robot.platform, &mut input),
            Some(MenuAction::Pick("line".to_string()))
        );
    }
}
