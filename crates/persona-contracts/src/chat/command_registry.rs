use crate::studio::SelectionAxis;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct AxisCommandSpec {
    pub command: &'static str,
    pub axis: SelectionAxis,
}

pub(crate) const AXIS_COMMANDS: &[AxisCommandSpec] = &[
    AxisCommandSpec {
        command: "type",
        axis: SelectionAxis::Archetype,
    },
    AxisCommandSpec {
        command: "mbti",
        axis: SelectionAxis::Archetype,
    },
    AxisCommandSpec {
        command: "style",
        axis: SelectionAxis::Style,
    },
    AxisCommandSpec {
        command: "gender",
        axis: SelectionAxis::Gender,
    },
    AxisCommandSpec {
        command: "size",
        axis: SelectionAxis::Size,
    },
    AxisCommandSpec {
        command: "resolution",
        axis: SelectionAxis::Size,
    },
];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "key",
        action: "select_key",
    },
    CommandSpec {
        command: "restore",
        action: "restore",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "download",
    action: "download",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "info",
        action: "info",
    },
    CommandSpec {
        command: "types",
        action: "list_types",
    },
    CommandSpec {
        command: "styles",
        action: "list_styles",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/type",
    "/style",
    "/gender",
    "/size",
    "/generate",
    "/dismiss",
    "/history",
    "/restore",
    "/download",
    "/info",
    "/types",
    "/styles",
    "/status",
    "/model",
    "/key",
    "/help",
    "/quit",
];
