use std::{sync::Arc, thread};

use crossbeam_channel::Receiver;
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div, img, px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{ActiveTheme, Root, StyledExt, h_flex, tag::Tag, v_flex};

use crate::{pipeline::CameraStream, types::RecognizedFrame};

mod render_util;

const CAMERA_WIDTH: f32 = 640.0;

/// Keeps the capture and recognizer threads alive for as long as the window is open.
pub struct Workers {
    camera_label: String,
    _camera: CameraStream,
    recognizer: thread::JoinHandle<()>,
}

impl Workers {
    pub fn new(
        camera_label: String,
        camera: CameraStream,
        recognizer: thread::JoinHandle<()>,
    ) -> Self {
        Self {
            camera_label,
            _camera: camera,
            recognizer,
        }
    }
}

pub fn launch_ui(
    app: &mut App,
    result_rx: Receiver<RecognizedFrame>,
    workers: Workers,
    threshold: f32,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Hand Distance Measurement".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(result_rx, workers, threshold));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    result_rx: Receiver<RecognizedFrame>,
    workers: Workers,
    threshold: f32,
    latest: Option<RecognizedFrame>,
    latest_image: Option<Arc<RenderImage>>,
}

impl AppView {
    fn new(result_rx: Receiver<RecognizedFrame>, workers: Workers, threshold: f32) -> Self {
        Self {
            result_rx,
            workers,
            threshold,
            latest: None,
            latest_image: None,
        }
    }

    fn poll_results(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(recognized) = self.result_rx.try_iter().last() else {
            return;
        };

        if let Some(image) = render_util::recognized_to_image(&recognized, self.threshold) {
            if let Some(old_image) = self.latest_image.replace(image) {
                // The sprite atlas keeps every texture until told otherwise.
                cx.drop_image(old_image, Some(window));
            }
        }
        self.latest = Some(recognized);
    }

    fn aspect_ratio(&self) -> f32 {
        self.latest
            .as_ref()
            .map(|r| &r.frame)
            .filter(|f| f.height > 0)
            .map(|f| f.width as f32 / f.height as f32)
            .unwrap_or(4.0 / 3.0)
    }

    fn render_feed(&self) -> AnyElement {
        match &self.latest_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for camera...")
                .into_any_element(),
        }
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });
        self.poll_results(window, cx);

        let theme = cx.theme();
        let alerting = self.latest.as_ref().is_some_and(|r| r.is_alerting());
        let status = self
            .latest
            .as_ref()
            .map(|r| r.status_text())
            .unwrap_or_else(|| "Starting hand tracking...".to_string());
        let status_color = if self.latest.as_ref().is_some_and(|r| r.hand.is_some()) {
            theme.foreground
        } else {
            theme.muted_foreground
        };
        let recognizer_running = !self.workers.recognizer.is_finished();

        let feed = div()
            .w(px(CAMERA_WIDTH))
            .h(px(CAMERA_WIDTH / self.aspect_ratio()))
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .child(self.render_feed());

        let status_row = h_flex()
            .gap_2()
            .items_center()
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(status_color)
                    .child(status),
            )
            .when(alerting, |this| {
                this.child(Tag::danger().rounded_full().child("Too close!"))
            })
            .when(!recognizer_running, |this| {
                this.child(
                    Tag::danger()
                        .rounded_full()
                        .child("Hand tracking stopped, see logs"),
                )
            });

        let footer = div()
            .text_xs()
            .text_color(theme.muted_foreground)
            .child(format!(
                "Camera: {} · alert below {:.0} cm",
                self.workers.camera_label, self.threshold
            ));

        v_flex()
            .size_full()
            .gap_3()
            .p_4()
            .bg(gpui::rgb(0x1a2332))
            .child(feed)
            .child(status_row)
            .child(footer)
    }
}
