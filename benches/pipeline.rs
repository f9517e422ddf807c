use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use nsx2md::export::filename::{sanitize, FilenameRules};
use nsx2md::parser::content::rewrite_content;

fn sample_note_html() -> String {
    let mut html = String::new();
    for i in 0..200 {
        html.push_str(&format!(
            r#"<p>Paragraph {i} with <b>bold</b> text.</p><img class="syno-notestation-image-object" src="webman/3rdparty/NoteStation/images/transparent.gif" ref="REF{i:04}">"#
        ));
        if i % 50 == 0 {
            html.push_str(r#"<iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe>"#);
        }
    }
    html
}

fn bench_rewrite_content(c: &mut Criterion) {
    let html = sample_note_html();
    c.bench_function("rewrite_content_200_images", |b| {
        b.iter(|| rewrite_content(black_box(&html)))
    });
}

fn bench_sanitize(c: &mut Criterion) {
    let titles = [
        "Groceries",
        "Meeting notes: 2024/05/01 <draft>?",
        "CON",
        "Reise nach Zürich %E2%9C%88 .",
        "非常に長いタイトルが続いているノートの名前です。非常に長いタイトルが続いているノートの名前です。",
    ];
    c.bench_function("sanitize_titles_windows", |b| {
        b.iter(|| {
            for title in &titles {
                black_box(sanitize(black_box(title), FilenameRules::Windows, 255));
            }
        })
    });
}

criterion_group!(benches, bench_rewrite_content, bench_sanitize);
criterion_main!(benches);
