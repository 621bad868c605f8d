use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::FormErrors;
use crate::application::pagination::Page;
use crate::domain::entities::{
    AuthorStats, CommentRecord, GroupRecord, PostRecord, UserRecord,
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render a fragment to a string so it can be cached or embedded in a page.
pub fn render_fragment<T: Template>(template: T) -> Result<String, HttpError> {
    render_template(template).map(|Html(body)| body)
}

pub fn render_not_found_response(chrome: LayoutChrome, path: &str) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found(path));
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        format!("no page at {path}"),
    )
    .attach(&mut response);
    response
}

/// Renders the 500 page, keeping whatever diagnostic report the failure carried.
pub fn render_server_error_response(chrome: LayoutChrome, report: ErrorReport) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::server_error());
    let mut response =
        render_template_response(ErrorTemplate { view }, StatusCode::INTERNAL_SERVER_ERROR);
    report.attach(&mut response);
    response
}

// Layout

#[derive(Clone, Debug)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
    pub profile_url: String,
}

#[derive(Clone, Debug)]
pub struct LayoutChrome {
    pub title: String,
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    pub fn new(title: impl Into<String>, viewer: Option<&UserRecord>) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                display_name: user.display_name(),
                profile_url: profile_url(&user.username),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutContext<T> {
    pub title: String,
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            title: chrome.title,
            viewer: chrome.viewer,
            content,
        }
    }
}

// Post listings

#[derive(Clone, Debug)]
pub struct GroupLink {
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub author_username: String,
    pub author_url: String,
    pub post_url: String,
    pub group: Option<GroupLink>,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            image_url: post.image.as_deref().map(media_url),
            published: format_timestamp(post.pub_date),
            iso_date: iso_timestamp(post.pub_date),
            author_username: post.author_username.clone(),
            author_url: profile_url(&post.author_username),
            post_url: post_url(&post.author_username, post.id),
            group: post.group.as_ref().map(|group| GroupLink {
                title: group.title.clone(),
                url: group_url(&group.slug),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PageLink {
    pub number: u32,
    pub url: String,
    pub current: bool,
}

#[derive(Clone, Debug)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous_url: Option<String>,
    pub next_url: Option<String>,
    pub pages: Vec<PageLink>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>, base_path: &str) -> Self {
        let link = |number: u32| format!("{base_path}?page={number}");
        let pages = if page.has_other_pages() {
            (1..=page.num_pages)
                .map(|number| PageLink {
                    number,
                    url: link(number),
                    current: number == page.number,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous_url: page.previous_page_number().map(link),
            next_url: page.next_page_number().map(link),
            pages,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.num_pages > 1
    }
}

/// The post list plus its paginator; the unit stored in the fragment cache.
#[derive(Template)]
#[template(path = "partials/post_list.html")]
pub struct PostListPartial {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: &'static str,
}

impl PostListPartial {
    pub fn from_page(page: &Page<PostRecord>, base_path: &str, empty_message: &'static str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::from_page(page, base_path),
            empty_message,
        }
    }
}

pub struct ListingView {
    pub heading: String,
    pub description: Option<String>,
    pub listing: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingView>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<ListingView>,
}

impl ListingView {
    pub fn for_group(group: &GroupRecord, listing: String) -> Self {
        let description = group.description.trim();
        Self {
            heading: group.title.clone(),
            description: (!description.is_empty()).then(|| description.to_string()),
            listing,
        }
    }
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<ListingView>,
}

// Authors

#[derive(Clone, Debug)]
pub struct FollowButton {
    pub following: bool,
    pub action_url: String,
}

#[derive(Clone, Debug)]
pub struct AuthorCard {
    pub username: String,
    pub display_name: String,
    pub profile_url: String,
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
    pub follow_button: Option<FollowButton>,
}

impl AuthorCard {
    pub fn new(author: &UserRecord, stats: AuthorStats, viewer_follows: Option<bool>) -> Self {
        let follow_button = viewer_follows.map(|following| FollowButton {
            following,
            action_url: if following {
                format!("/{}/unfollow/", author.username)
            } else {
                format!("/{}/follow/", author.username)
            },
        });

        Self {
            username: author.username.clone(),
            display_name: author.display_name(),
            profile_url: profile_url(&author.username),
            posts: stats.posts,
            followers: stats.followers,
            following: stats.following,
            follow_button,
        }
    }
}

pub struct ProfileView {
    pub author: AuthorCard,
    pub listing: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

// Post page

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author_username: String,
    pub author_url: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            author_url: profile_url(&comment.author_username),
            text: comment.text.clone(),
            created: format_timestamp(comment.created),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommentFormView {
    pub action_url: String,
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author: AuthorCard,
    pub comments: Vec<CommentView>,
    pub comment_form: Option<CommentFormView>,
    pub edit_url: Option<String>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

// Forms

#[derive(Clone, Debug)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action_url: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl PostFormView {
    /// `selected_group` is the raw submitted value, or the post's group id on first render.
    pub fn new(
        action_url: String,
        is_edit: bool,
        text: &str,
        selected_group: &str,
        groups: &[GroupRecord],
        current_image: Option<&str>,
        errors: &FormErrors,
    ) -> Self {
        Self {
            is_edit,
            action_url,
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| GroupOption {
                    id: group.id,
                    title: group.title.clone(),
                    selected: group.id.to_string() == selected_group.trim(),
                })
                .collect(),
            current_image: current_image.map(media_url),
            text_errors: errors.field("text").to_vec(),
            group_errors: errors.field("group").to_vec(),
            image_errors: errors.field("image").to_vec(),
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "new_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Default)]
pub struct SignupView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub username_errors: Vec<String>,
    pub email_errors: Vec<String>,
    pub password1_errors: Vec<String>,
    pub password2_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl SignupView {
    pub fn with_errors(
        first_name: &str,
        last_name: &str,
        username: &str,
        email: &str,
        errors: &FormErrors,
    ) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            username_errors: errors.field("username").to_vec(),
            email_errors: errors.field("email").to_vec(),
            password1_errors: errors.field("password1").to_vec(),
            password2_errors: errors.field("password2").to_vec(),
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

#[derive(Default)]
pub struct LoginView {
    pub username: String,
    pub next: String,
    pub username_errors: Vec<String>,
    pub password_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

// Errors

pub struct ErrorPageView {
    pub status_code: u16,
    pub title: &'static str,
    pub message: String,
    pub path: Option<String>,
}

impl ErrorPageView {
    pub fn not_found(path: &str) -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            title: "Page not found",
            message: "The page you requested does not exist.".to_string(),
            path: Some(path.to_string()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            title: "Server error",
            message: "Something went wrong. Please try again later.".to_string(),
            path: None,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

// URLs and formatting

pub fn profile_url(username: &str) -> String {
    format!("/{username}/")
}

pub fn post_url(username: &str, post_id: i64) -> String {
    format!("/{username}/{post_id}/")
}

pub fn group_url(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[day padding:none] [month repr:long] [year] [hour]:[minute]"
        ))
        .unwrap_or_default()
}

fn iso_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample_page(count: u64, number: u32) -> Page<()> {
        Page {
            items: Vec::new(),
            number,
            num_pages: count.div_ceil(10).max(1) as u32,
            count,
        }
    }

    #[test]
    fn paginator_links_keep_base_path() {
        let view = PaginatorView::from_page(&sample_page(25, 2), "/group/cats/");
        assert_eq!(view.previous_url.as_deref(), Some("/group/cats/?page=1"));
        assert_eq!(view.next_url.as_deref(), Some("/group/cats/?page=3"));
        assert_eq!(view.pages.len(), 3);
        assert!(view.pages[1].current);
        assert!(view.is_visible());
    }

    #[test]
    fn single_page_has_no_links() {
        let view = PaginatorView::from_page(&sample_page(3, 1), "/");
        assert!(view.pages.is_empty());
        assert!(view.previous_url.is_none());
        assert!(view.next_url.is_none());
        assert!(!view.is_visible());
    }

    #[test]
    fn timestamps_use_long_month_names() {
        let value = datetime!(2026-03-07 09:05 UTC);
        assert_eq!(format_timestamp(value), "7 March 2026 09:05");
    }

    #[test]
    fn follow_button_targets_match_state() {
        let author = UserRecord {
            id: 1,
            username: "leo".into(),
            email: String::new(),
            first_name: "Leo".into(),
            last_name: "Tolstoy".into(),
            password_hash: String::new(),
            date_joined: datetime!(2026-01-01 0:00 UTC),
        };
        let card = AuthorCard::new(&author, AuthorStats::default(), Some(true));
        let button = card.follow_button.expect("button shown");
        assert!(button.following);
        assert_eq!(button.action_url, "/leo/unfollow/");
        assert_eq!(card.display_name, "Leo Tolstoy");

        assert!(AuthorCard::new(&author, AuthorStats::default(), None)
            .follow_button
            .is_none());
    }
}
