use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use studyquiz_core::aggregate::WeightedGradeAggregator;
use studyquiz_core::grader::{percentage, AnswerGrader};
use studyquiz_core::model::{
    CourseId, CourseworkId, CourseworkItem, DraftQuestion, OptionLabel, Quiz, QuizDraft, QuizOption,
};

fn in_progress_quiz(n: u32) -> Quiz {
    let label = |i: usize| OptionLabel::from_index(i).unwrap();
    let draft = QuizDraft {
        name: "bench".into(),
        questions: (1..=n)
            .map(|id| DraftQuestion {
                id,
                prompt: format!("question {id}"),
                options: (0..4)
                    .map(|i| QuizOption {
                        label: label(i),
                        text: format!("option {i}"),
                    })
                    .collect(),
                correct_label: label(id as usize % 4),
            })
            .collect(),
    };
    let mut quiz = Quiz::from_draft(draft, CourseId::new("bench"));
    quiz.assign().unwrap();
    let answers = (1..=n).map(|id| (id, label(0))).collect();
    quiz.record_answers(&answers).unwrap();
    quiz
}

fn coursework(n: usize) -> Vec<CourseworkItem> {
    (0..n)
        .map(|i| CourseworkItem {
            id: CourseworkId::new(),
            course_id: CourseId::new("bench"),
            name: format!("item {i}"),
            weight: 1.0 / n as f64,
            grade: (i % 3 != 0).then_some(70.0 + i as f64 % 30.0),
            quiz_id: None,
        })
        .collect()
}

fn bench_percentage(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentage");

    group.bench_function("1/3", |b| {
        b.iter(|| percentage(black_box(1), black_box(3)))
    });

    group.bench_function("977/1000", |b| {
        b.iter(|| percentage(black_box(977), black_box(1000)))
    });

    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit");

    for n in [10, 100] {
        let quiz = in_progress_quiz(n);
        group.bench_function(format!("questions={n}"), |b| {
            b.iter_batched(
                || quiz.clone(),
                |mut q| AnswerGrader::submit(black_box(&mut q)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");

    for n in [5, 50] {
        let items = coursework(n);
        group.bench_function(format!("items={n}"), |b| {
            b.iter(|| WeightedGradeAggregator::recompute(black_box(&items)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_percentage, bench_submit, bench_recompute);
criterion_main!(benches);
