use crate::command::{LcdCommand, HOME_KEY};
use crate::cursor::ROWS;
use crate::display::Panel;
use crate::error::PanelError;
use log::debug;

/// What the state machine should do after a menu handled a key.
pub enum MenuTransition {
    Stay,
    /// Render `menu` and make it active on top of the current one.
    Open(Box<dyn Menu>),
    /// Return to the menu below the active one.
    Back,
    Home,
}

impl std::fmt::Debug for MenuTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuTransition::Stay => f.write_str("Stay"),
            MenuTransition::Open(menu) => write!(f, "Open({})", menu.name()),
            MenuTransition::Back => f.write_str("Back"),
            MenuTransition::Home => f.write_str("Home"),
        }
    }
}

/// A screen on the panel.
///
/// `render` may be called before the menu becomes active, so it must draw
/// from the panel state it is given and not from anything set up by
/// activation.
pub trait Menu: Send {
    fn name(&self) -> &str;

    fn render(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError>;

    fn handle_key(&mut self, key: u8, panel: &mut Panel<'_>) -> Result<MenuTransition, PanelError>;
}

/// Root screen: fixed title lines followed by a health summary.
#[derive(Debug, Clone)]
pub struct HomeMenu {
    title: Vec<String>,
}

impl Default for HomeMenu {
    fn default() -> Self {
        Self::new(["Front Panel"])
    }
}

impl HomeMenu {
    pub fn new<I, S>(title: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let title = title
            .into_iter()
            .map(Into::into)
            .take(usize::from(ROWS) - 1)
            .collect();
        Self { title }
    }

    fn health_line(panel: &Panel<'_>) -> &'static str {
        let health = panel.health();
        if health.is_nominal() {
            return "Status: OK";
        }
        if !health.fault {
            "Status: FAULT"
        } else if !health.alarm {
            "Status: ALARM"
        } else {
            "Status: DEGRADED"
        }
    }
}

impl Menu for HomeMenu {
    fn name(&self) -> &str {
        "home"
    }

    fn render(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        panel.clear()?;
        let mut row = 1;
        for line in &self.title {
            panel.set_position(1, row)?;
            panel.write_text(line)?;
            row += 1;
        }
        let status = Self::health_line(panel);
        panel.set_position(1, row)?;
        panel.write_text(status)?;
        Ok(())
    }

    fn handle_key(&mut self, key: u8, _panel: &mut Panel<'_>) -> Result<MenuTransition, PanelError> {
        debug!("home menu ignoring key 0x{key:02x}");
        Ok(MenuTransition::Stay)
    }
}

/// Active menu tracking. The home menu sits below every other menu and is
/// active when the stack is empty.
pub struct MenuStateMachine {
    home: Box<dyn Menu>,
    stack: Vec<Box<dyn Menu>>,
}

impl MenuStateMachine {
    pub fn new(home: Box<dyn Menu>) -> Self {
        Self {
            home,
            stack: Vec::new(),
        }
    }

    pub fn is_home(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn active_name(&self) -> &str {
        self.stack.last().unwrap_or(&self.home).name()
    }

    /// Renders `menu`, then makes it the only menu above home.
    pub fn set_active(&mut self, mut menu: Box<dyn Menu>, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        menu.render(panel)?;
        self.stack.clear();
        self.stack.push(menu);
        Ok(())
    }

    /// Renders `menu`, then pushes it above the active one.
    pub fn open(&mut self, mut menu: Box<dyn Menu>, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        menu.render(panel)?;
        self.stack.push(menu);
        Ok(())
    }

    /// Renders the menu below the active one, then pops.
    pub fn back(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        if self.stack.is_empty() {
            return Ok(());
        }
        let below = self.stack.len() - 1;
        match self.stack[..below].last_mut() {
            Some(menu) => menu.render(panel)?,
            None => self.home.render(panel)?,
        }
        self.stack.pop();
        Ok(())
    }

    /// Renders the home menu, then drops every menu above it.
    pub fn go_home(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        self.home.render(panel)?;
        self.stack.clear();
        Ok(())
    }

    /// Routes one keypress.
    ///
    /// The home key clears the display, shows the home menu and
    /// acknowledges; every other byte goes to the active menu unfiltered.
    pub fn dispatch(&mut self, key: u8, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        if key == HOME_KEY {
            panel.clear()?;
            self.go_home(panel)?;
            panel.send(LcdCommand::HomeAcknowledge)?;
            return Ok(());
        }

        let active = self.stack.last_mut().unwrap_or(&mut self.home);
        let transition = active.handle_key(key, panel)?;
        debug!("key 0x{key:02x} -> {transition:?}");
        match transition {
            MenuTransition::Stay => Ok(()),
            MenuTransition::Open(menu) => self.open(menu, panel),
            MenuTransition::Back => self.back(panel),
            MenuTransition::Home => self.go_home(panel),
        }
    }
}
