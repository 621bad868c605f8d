use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::pagination::parse_page_number;
use crate::cache::INDEX_PAGE_FRAGMENT;
use crate::presentation::views::{
    AuthorCard, CommentFormView, CommentView, FollowTemplate, GroupTemplate, IndexTemplate,
    LayoutChrome, LayoutContext, ListingView, PostCard, PostDetailView, PostListPartial,
    PostTemplate, ProfileTemplate, ProfileView, group_url, post_url, profile_url,
    render_fragment, render_not_found_response, render_template_response,
};

use super::{HttpState, RequireUser, Viewer, app_error_response, parse_post_id};

#[derive(Debug, Default, Deserialize)]
pub(super) struct PageQuery {
    page: Option<String>,
}

/// Front page. The post list is served from the `index_page` fragment while it is fresh.
pub(super) async fn index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::feed::index";
    let chrome = LayoutChrome::new("Latest posts", viewer.as_ref());

    let page_key = parse_page_number(query.page.as_deref()).to_string();
    let listing = match state.fragments.get(INDEX_PAGE_FRAGMENT, &[&page_key]) {
        Some(html) => html.to_string(),
        None => {
            let page = match state.feed.index(query.page.as_deref()).await {
                Ok(page) => page,
                Err(err) => return app_error_response(SOURCE, chrome, uri.path(), err),
            };
            let partial = PostListPartial::from_page(&page, "/", "No posts yet.");
            let html = match render_fragment(partial) {
                Ok(html) => html,
                Err(err) => return err.into_response(),
            };
            state
                .fragments
                .put(INDEX_PAGE_FRAGMENT, &[&page_key], html.as_str());
            html
        }
    };

    let content = ListingView {
        heading: "Latest posts".to_string(),
        description: None,
        listing,
    };
    render_template_response(
        IndexTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::feed::group_posts";

    let (group, page) = match state.feed.group(&slug, query.page.as_deref()).await {
        Ok(found) => found,
        Err(err) => {
            let chrome = LayoutChrome::new("Group", viewer.as_ref());
            return app_error_response(SOURCE, chrome, uri.path(), err);
        }
    };

    let partial = PostListPartial::from_page(
        &page,
        &group_url(&group.slug),
        "No posts in this group yet.",
    );
    let listing = match render_fragment(partial) {
        Ok(html) => html,
        Err(err) => return err.into_response(),
    };

    let chrome = LayoutChrome::new(group.title.clone(), viewer.as_ref());
    render_template_response(
        GroupTemplate {
            view: LayoutContext::new(chrome, ListingView::for_group(&group, listing)),
        },
        StatusCode::OK,
    )
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::feed::profile";

    let profile = match state
        .feed
        .profile(&username, query.page.as_deref(), viewer.as_ref())
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            let chrome = LayoutChrome::new("Profile", viewer.as_ref());
            return app_error_response(SOURCE, chrome, uri.path(), err);
        }
    };

    let partial = PostListPartial::from_page(
        &profile.page,
        &profile_url(&profile.author.username),
        "This author has not posted yet.",
    );
    let listing = match render_fragment(partial) {
        Ok(html) => html,
        Err(err) => return err.into_response(),
    };

    let chrome = LayoutChrome::new(profile.author.display_name(), viewer.as_ref());
    let content = ProfileView {
        author: AuthorCard::new(&profile.author, profile.stats, profile.viewer_follows),
        listing,
    };
    render_template_response(
        ProfileTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(viewer): RequireUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::feed::follow_index";
    let chrome = LayoutChrome::new("Following", Some(&viewer));

    let page = match state.feed.follow_index(&viewer, query.page.as_deref()).await {
        Ok(page) => page,
        Err(err) => return app_error_response(SOURCE, chrome, uri.path(), err),
    };

    let partial = PostListPartial::from_page(
        &page,
        "/follow/",
        "Nothing here yet. Follow some authors to fill this feed.",
    );
    let listing = match render_fragment(partial) {
        Ok(html) => html,
        Err(err) => return err.into_response(),
    };

    let content = ListingView {
        heading: "Following".to_string(),
        description: None,
        listing,
    };
    render_template_response(
        FollowTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn post_view(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::feed::post_view";

    let Some(post_id) = parse_post_id(&post_id) else {
        let chrome = LayoutChrome::new("Post", viewer.as_ref());
        return render_not_found_response(chrome, uri.path());
    };

    let detail = match state.feed.post_detail(&username, post_id).await {
        Ok(detail) => detail,
        Err(err) => {
            let chrome = LayoutChrome::new("Post", viewer.as_ref());
            return app_error_response(SOURCE, chrome, uri.path(), err);
        }
    };

    let is_author = viewer
        .as_ref()
        .is_some_and(|user| user.id == detail.author.id);
    let base = post_url(&detail.author.username, detail.post.id);
    let content = PostDetailView {
        post: PostCard::from(&detail.post),
        author: AuthorCard::new(&detail.author, detail.stats, None),
        comments: detail.comments.iter().map(CommentView::from).collect(),
        comment_form: viewer.as_ref().map(|_| CommentFormView {
            action_url: format!("{base}comment/"),
        }),
        edit_url: is_author.then(|| format!("{base}edit/")),
    };

    let title = excerpt(&detail.post.text, 30);
    let chrome = LayoutChrome::new(title, viewer.as_ref());
    render_template_response(
        PostTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(max_chars).collect();
    short.push('…');
    short
}
