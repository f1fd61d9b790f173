use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_mesh::cloner::Cloner;
use redlilium_mesh::serialize::{Exporter, Importer, InputCapsule, OutputCapsule};
use redlilium_mesh::{Mesh, VertexBuffer, VertexBufferType, VertexData};

/// A skinned grid of `size` x `size` vertices with bind poses for every channel.
fn skinned_grid(size: usize) -> Mesh {
    let vertices = size * size;
    let mut positions = Vec::with_capacity(vertices * 3);
    for y in 0..size {
        for x in 0..size {
            positions.extend([x as f32, y as f32, 0.0]);
        }
    }
    let mut indices = Vec::with_capacity((size - 1) * (size - 1) * 6);
    for y in 0..size as u32 - 1 {
        for x in 0..size as u32 - 1 {
            let i = y * size as u32 + x;
            indices.extend([i, i + 1, i + size as u32, i + 1, i + size as u32 + 1, i + size as u32]);
        }
    }

    let float3 = |t, data: Vec<f32>| VertexBuffer::new(t).with_data(3, VertexData::Float(data));
    let mut mesh = Mesh::new();
    for (live, bind_pose) in redlilium_mesh::mesh::ANIM_CHANNELS {
        let data = if live == VertexBufferType::Position {
            positions.clone()
        } else {
            vec![0.0; vertices * 3]
        };
        mesh.set_buffer(float3(live, data.clone())).unwrap();
        mesh.set_buffer(float3(bind_pose, data)).unwrap();
    }
    mesh.set_buffer(
        VertexBuffer::new(VertexBufferType::Index).with_data(3, VertexData::UnsignedInt(indices)),
    )
    .unwrap();
    mesh.set_buffer(
        VertexBuffer::new(VertexBufferType::BoneIndex)
            .with_data(4, VertexData::UnsignedByte(vec![0; vertices * 4])),
    )
    .unwrap();
    mesh.update_counts();
    mesh
}

// ---------------------------------------------------------------------------
// Cloning
// ---------------------------------------------------------------------------

fn bench_shallow_clone(c: &mut Criterion) {
    let mesh = skinned_grid(64);
    c.bench_function("shallow_clone_64x64", |b| {
        b.iter(|| black_box(mesh.shallow_clone()));
    });
}

fn bench_deep_clone(c: &mut Criterion) {
    let mesh = skinned_grid(64);
    c.bench_function("deep_clone_64x64", |b| {
        b.iter(|| black_box(mesh.deep_clone()));
    });
}

fn bench_clone_for_anim(c: &mut Criterion) {
    let mesh = skinned_grid(64);
    c.bench_function("clone_for_anim_64x64", |b| {
        b.iter(|| black_box(mesh.clone_for_anim()));
    });
}

fn bench_graph_clone(c: &mut Criterion) {
    let mesh = skinned_grid(64);
    c.bench_function("graph_clone_64x64", |b| {
        b.iter(|| black_box(Cloner::new().clone_graph(&mesh)));
    });
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn bench_write(c: &mut Criterion) {
    let mut mesh = skinned_grid(64);
    c.bench_function("write_64x64", |b| {
        b.iter(|| {
            let mut exporter = Exporter::new();
            let mut out = OutputCapsule::new(&mut exporter);
            mesh.write(&mut out).unwrap();
            black_box(out.finish())
        });
    });
}

fn bench_read(c: &mut Criterion) {
    let mut mesh = skinned_grid(64);
    let mut exporter = Exporter::new();
    let mut out = OutputCapsule::new(&mut exporter);
    mesh.write(&mut out).unwrap();
    let value = out.finish();

    c.bench_function("read_64x64", |b| {
        b.iter(|| {
            let mut importer = Importer::new();
            let mut input = InputCapsule::new(&mut importer, black_box(value.clone())).unwrap();
            black_box(Mesh::read(&mut input).unwrap())
        });
    });
}

fn bench_collision_data(c: &mut Criterion) {
    let mesh = skinned_grid(64);
    c.bench_function("create_collision_data_64x64", |b| {
        b.iter(|| {
            let mut copy = mesh.shallow_clone();
            copy.clear_collision_data();
            copy.create_collision_data().unwrap().triangle_count()
        });
    });
}

criterion_group!(
    cloning,
    bench_shallow_clone,
    bench_deep_clone,
    bench_clone_for_anim,
    bench_graph_clone,
);

criterion_group!(persistence, bench_write, bench_read, bench_collision_data);

criterion_main!(cloning, persistence);
