// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nlbridge::{Context, GradientSparsity};
use nlbridge_reference::Reference;
use std::hint::black_box;

/// Builds `min sum_i (x - i)^2` with one value callback (and an analytic
/// gradient) per term.
fn separable(ctx: &mut Context<'_, Reference>, terms: usize) {
    ctx.add_var().unwrap();
    for i in 0..terms {
        let target = i as f64;
        let token = ctx
            .register_value_callback(true, &[], move |_, request, result| {
                let d = request.x()[0] - target;
                result.set_objective(d * d);
                0
            })
            .unwrap();
        ctx.attach_gradient(token, GradientSparsity::dense(), move |_, request, result| {
            result.objective_gradient_mut()[0] = 2.0 * (request.x()[0] - target);
            0
        })
        .unwrap();
    }
}

fn bench_callback_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("callback_dispatch");
    for terms in [1_usize, 10, 100] {
        let mut ctx = Context::<Reference>::new().unwrap();
        separable(&mut ctx, terms);

        group.throughput(Throughput::Elements(terms as u64));
        group.bench_with_input(BenchmarkId::new("solve", terms), &terms, |b, _| {
            b.iter(|| {
                let status = ctx.solve().unwrap();
                if !status.is_feasible() {
                    panic!("Benchmark configuration error: separable problem reported {}", status);
                }
                black_box(status)
            })
        });
    }
    group.finish();
}

fn bench_problem_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("problem_building");
    for size in [100_usize, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("linear_terms", size), &size, |b, &size| {
            b.iter(|| {
                let mut ctx = Context::<Reference>::new().unwrap();
                let vars = ctx.add_vars(size).unwrap();
                let con = ctx.add_con().unwrap();
                for &v in &vars {
                    ctx.add_obj_linear_term(v, 1.0).unwrap();
                    ctx.add_con_linear_term(con, v, 2.0).unwrap();
                }
                black_box(ctx.terms().num_linear())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_callback_dispatch, bench_problem_building);
criterion_main!(benches);
