//! Download settings panel
//!
//! The panel edits a draft copy of the rule set; nothing is applied until
//! the composer saves it.

use crate::config::{FilenameRuleSet, NamingRule, Resolution, Separator};
use crate::constants::download::{MENU_ID, NAMESPACE, Z_INDEX_MENU};
use crate::page::{Dom, NodeId, Scope};

#[derive(Debug, Clone, Default)]
pub struct SettingsMenu {
    draft: Option<FilenameRuleSet>,
}

impl SettingsMenu {
    pub fn open(&mut self, current: FilenameRuleSet) {
        self.draft = Some(current);
    }

    pub fn close(&mut self) {
        self.draft = None;
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    /// Values currently shown, `None` while closed
    pub fn draft(&self) -> Option<FilenameRuleSet> {
        self.draft
    }

    pub fn select_resolution(&mut self, resolution: Resolution) {
        if let Some(draft) = self.draft.as_mut() {
            draft.resolution = resolution;
        }
    }

    pub fn toggle_rule(&mut self, rule: NamingRule) {
        if let Some(draft) = self.draft.as_mut() {
            draft.naming_rules.toggle(rule);
        }
    }

    pub fn select_separator(&mut self, separator: Separator) {
        if let Some(draft) = self.draft.as_mut() {
            draft.separator = separator;
        }
    }
}

/// Create the hidden panel element unless it already exists
pub fn mount_panel(dom: &dyn Dom) -> NodeId {
    if let Some(panel) = dom.element_by_id(MENU_ID) {
        return panel;
    }
    let panel = dom.create_element("div", Some(MENU_ID));
    dom.set_attribute(panel, "class", &format!("{NAMESPACE}-menu"));
    for (property, value) in [
        ("position", "fixed".to_string()),
        ("z-index", Z_INDEX_MENU.to_string()),
        ("right", "1%".to_string()),
        ("top", "5%".to_string()),
        ("font-size", "14px".to_string()),
        ("display", "none".to_string()),
    ] {
        dom.set_inline_style(panel, property, Some(&value));
    }
    dom.append_child(dom.scope(Scope::Body), panel);
    panel
}

/// Show `rules` in the panel; controls are built on first use and updated
/// in place afterwards
pub fn render(dom: &dyn Dom, panel: NodeId, rules: &FilenameRuleSet) {
    if dom.element_by_id(&resolution_id(0)).is_none() {
        build(dom, panel);
    }

    for (index, resolution) in Resolution::ALL.into_iter().enumerate() {
        mark(dom, &resolution_id(index), "checked", rules.resolution == resolution);
    }
    for rule in NamingRule::ORDER {
        mark(dom, &rule_id(rule), "checked", rules.naming_rules.is_enabled(rule));
    }
    for (index, separator) in Separator::ALL.into_iter().enumerate() {
        mark(dom, &separator_id(index), "selected", rules.separator == separator);
    }
}

fn build(dom: &dyn Dom, panel: NodeId) {
    dom.set_text(panel, "");

    let fieldset = dom.create_element("fieldset", None);
    dom.set_attribute(fieldset, "class", &format!("{NAMESPACE}-fieldset"));
    let legend = dom.create_element("legend", None);
    dom.set_text(legend, "Settings");
    dom.append_child(fieldset, legend);

    for (index, resolution) in Resolution::ALL.into_iter().enumerate() {
        let value = resolution.token().unwrap_or_default();
        let input = option(
            dom,
            &resolution_id(index),
            "radio",
            &format!("{NAMESPACE}-resolution"),
            value,
        );
        labelled(dom, fieldset, resolution.label(), input);
    }

    for rule in NamingRule::ORDER {
        let input = option(
            dom,
            &rule_id(rule),
            "checkbox",
            &format!("{NAMESPACE}-namerule"),
            rule.key(),
        );
        labelled(dom, fieldset, rule.key(), input);
    }

    let select = dom.create_element("select", None);
    dom.set_attribute(select, "name", &format!("{NAMESPACE}-separator"));
    for (index, separator) in Separator::ALL.into_iter().enumerate() {
        let choice = dom.create_element("option", Some(&separator_id(index)));
        dom.set_attribute(choice, "value", &separator.as_char().to_string());
        let text = match separator {
            Separator::Space => "Space".to_string(),
            other => other.as_char().to_string(),
        };
        dom.set_text(choice, &text);
        dom.append_child(select, choice);
    }
    dom.append_child(fieldset, select);

    for action in ["reset", "save", "cancel"] {
        let button = dom.create_element("button", None);
        dom.set_attribute(button, "class", &format!("{NAMESPACE}-btn {NAMESPACE}-btn-{action}"));
        dom.append_child(fieldset, button);
    }

    dom.append_child(panel, fieldset);
}

fn resolution_id(index: usize) -> String {
    format!("{NAMESPACE}-resolution-{index}")
}

fn rule_id(rule: NamingRule) -> String {
    format!("{NAMESPACE}-namerule-{}", rule.key())
}

fn separator_id(index: usize) -> String {
    format!("{NAMESPACE}-separator-{index}")
}

pub fn set_visible(dom: &dyn Dom, panel: NodeId, visible: bool) {
    let display = if visible { "block" } else { "none" };
    dom.set_inline_style(panel, "display", Some(display));
}

fn option(dom: &dyn Dom, id: &str, kind: &str, name: &str, value: &str) -> NodeId {
    let input = dom.create_element("input", Some(id));
    dom.set_attribute(input, "type", kind);
    dom.set_attribute(input, "name", name);
    dom.set_attribute(input, "value", value);
    input
}

fn mark(dom: &dyn Dom, id: &str, attribute: &str, on: bool) {
    let Some(node) = dom.element_by_id(id) else {
        return;
    };
    if on {
        dom.set_attribute(node, attribute, attribute);
    } else {
        dom.remove_attribute(node, attribute);
    }
}

fn labelled(dom: &dyn Dom, parent: NodeId, text: &str, input: NodeId) {
    let item = dom.create_element("li", None);
    let label = dom.create_element("label", None);
    dom.set_text(label, text);
    dom.append_child(item, label);
    dom.append_child(item, input);
    dom.append_child(parent, item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryDom;

    #[test]
    fn test_edits_need_open_panel() {
        let mut menu = SettingsMenu::default();
        menu.select_separator(Separator::Dot);
        assert_eq!(menu.draft(), None);

        menu.open(FilenameRuleSet::default());
        menu.select_separator(Separator::Dot);
        menu.toggle_rule(NamingRule::Copyright);
        menu.select_resolution(Resolution::Native);

        let draft = menu.draft().unwrap();
        assert_eq!(draft.separator, Separator::Dot);
        assert!(draft.naming_rules.copyright);
        assert_eq!(draft.resolution, Resolution::Native);
    }

    #[test]
    fn test_render_marks_current_values() {
        let dom = MemoryDom::from_body(vec![]);
        let panel = mount_panel(&dom);
        render(&dom, panel, &FilenameRuleSet::default());

        let checked = dom.query("#bt-dl-menu input").unwrap();
        assert_eq!(dom.attribute(checked, "value").as_deref(), Some("UHD"));
        assert_eq!(dom.attribute(checked, "checked").as_deref(), Some("checked"));
        assert!(dom.query("#bt-dl-menu button.bt-dl-btn-save").is_some());
    }

    #[test]
    fn test_rerender_updates_controls_in_place() {
        let dom = MemoryDom::from_body(vec![]);
        let panel = mount_panel(&dom);
        render(&dom, panel, &FilenameRuleSet::default());
        let connected = dom.connected_count();
        let allocated = dom.node_count();

        let mut rules = FilenameRuleSet::default();
        rules.resolution = Resolution::Native;
        rules.naming_rules.copyright = true;
        rules.naming_rules.description = false;
        rules.separator = Separator::Dot;
        for _ in 0..5 {
            render(&dom, panel, &rules);
        }

        assert_eq!(dom.connected_count(), connected);
        assert_eq!(dom.node_count(), allocated);
        assert_eq!(mount_panel(&dom), panel);

        let checked = |id: &str, attribute: &str| {
            let node = dom.element_by_id(id).unwrap();
            dom.attribute(node, attribute).is_some()
        };
        let native = Resolution::ALL.iter().position(|r| *r == Resolution::Native).unwrap();
        assert!(checked(&resolution_id(native), "checked"));
        assert!(!checked(&resolution_id(0), "checked"));
        assert!(checked("bt-dl-namerule-copyright", "checked"));
        assert!(!checked("bt-dl-namerule-description", "checked"));
        let dot = Separator::ALL.iter().position(|s| *s == Separator::Dot).unwrap();
        assert!(checked(&separator_id(dot), "selected"));
        assert!(!checked(&separator_id(0), "selected"));
    }
}
