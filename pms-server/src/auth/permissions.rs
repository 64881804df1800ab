//! Role-based authorization
//!
//! Global actions depend on the user's own role. Project actions depend on
//! the role the user holds in that project; PMO users may do everything on
//! every project whether or not they are members.

use crate::models::Role;

/// Actions outside any single project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageOrganizations,
    ManageUsers,
    CreateProject,
    ViewPortfolio,
}

/// Actions on one project and its phases, tasks, comments, attachments and decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    View,
    Comment,
    Attach,
    /// Create, edit and move tasks
    EditTask,
    /// Delete tasks, manage dependencies, import spreadsheets
    ManageTasks,
    ManagePhases,
    ProposeDecision,
    /// Accept, reject or supersede decisions
    DecideDecision,
    /// Edit or delete the project, manage members
    ManageProject,
}

pub fn can(role: Role, action: Action) -> bool {
    match action {
        Action::ManageOrganizations | Action::ManageUsers => role == Role::Pmo,
        Action::CreateProject | Action::ViewPortfolio => matches!(role, Role::Pmo | Role::Pm),
    }
}

/// `membership` is the user's role in the project, `None` for non-members.
pub fn can_on_project(global: Role, membership: Option<Role>, action: ProjectAction) -> bool {
    if global == Role::Pmo {
        return true;
    }

    let Some(role) = membership else {
        return false;
    };

    use ProjectAction::*;
    match role {
        Role::Pmo | Role::Pm => true,
        Role::Pl => !matches!(action, DecideDecision | ManageProject),
        Role::Developer | Role::Designer => {
            matches!(action, View | Comment | Attach | EditTask)
        }
        Role::Consultant => matches!(action, View | Comment | Attach | ProposeDecision),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProjectAction::*;

    const ALL: [ProjectAction; 9] = [
        View,
        Comment,
        Attach,
        EditTask,
        ManageTasks,
        ManagePhases,
        ProposeDecision,
        DecideDecision,
        ManageProject,
    ];

    fn allowed(role: Role) -> Vec<ProjectAction> {
        ALL.into_iter()
            .filter(|a| can_on_project(Role::Developer, Some(role), *a))
            .collect()
    }

    #[test]
    fn global_actions() {
        assert!(can(Role::Pmo, Action::ManageUsers));
        assert!(!can(Role::Pm, Action::ManageUsers));
        assert!(!can(Role::Pm, Action::ManageOrganizations));
        assert!(can(Role::Pm, Action::CreateProject));
        assert!(can(Role::Pm, Action::ViewPortfolio));
        for role in [Role::Pl, Role::Developer, Role::Designer, Role::Consultant] {
            assert!(!can(role, Action::CreateProject), "{role}");
            assert!(!can(role, Action::ViewPortfolio), "{role}");
        }
    }

    #[test]
    fn pmo_needs_no_membership() {
        for action in ALL {
            assert!(can_on_project(Role::Pmo, None, action));
        }
    }

    #[test]
    fn non_members_get_nothing() {
        for action in ALL {
            assert!(!can_on_project(Role::Pm, None, action));
        }
    }

    #[test]
    fn membership_matrix() {
        assert_eq!(allowed(Role::Pm), ALL.to_vec());
        assert_eq!(
            allowed(Role::Pl),
            vec![View, Comment, Attach, EditTask, ManageTasks, ManagePhases, ProposeDecision]
        );
        assert_eq!(allowed(Role::Developer), vec![View, Comment, Attach, EditTask]);
        assert_eq!(allowed(Role::Designer), vec![View, Comment, Attach, EditTask]);
        assert_eq!(
            allowed(Role::Consultant),
            vec![View, Comment, Attach, ProposeDecision]
        );
    }
}
