//! On-disk bundle round trips over synthetic assets.
//!
//! Builds an asset from scratch, saves it, loads it back through the full
//! strict read path, and saves again: the second bundle must be byte
//! identical to the first, and every export offset must line up with the
//! container size plus the preceding payload sizes.

use glam::{DQuat, DVec3};
use tempfile::TempDir;

use uasset::prelude::*;
use uasset::skeleton::{Bone, BoneArray};
use uasset::uasset::{ExportRecord, ImportRecord, NameRef, NameTable, PackageHeader};

fn bone(name_id: u32, parent: i32) -> Bone {
    Bone {
        name_id: name_id as i32,
        instance: 0,
        parent,
        name: String::new(),
        parent_name: String::new(),
        children: Vec::new(),
        rotation: DQuat::IDENTITY,
        position: DVec3::new(0.0, 0.0, 2.0),
        scale: DVec3::ONE,
    }
}

/// Build a complete skeleton asset in memory.
fn synthetic_skeleton_asset(dir: &std::path::Path) -> Uasset {
    let mut names = NameTable::default();
    let script = names.intern("/Script/Engine");
    let package = names.intern("Package");
    let skeleton_class = names.intern("Skeleton");
    let asset_name = names.intern("SK_Test_Skeleton");
    names.intern("/Game/Test/SK_Test_Skeleton");
    names.intern("None");
    let root = names.intern("Root");
    let spine = names.intern("Spine");

    let imports = vec![
        ImportRecord {
            class_package: NameRef::new(script),
            class: NameRef::new(package),
            parent_import_id: 0,
            name: NameRef::new(script),
            ..Default::default()
        },
        ImportRecord {
            class_package: NameRef::new(script),
            class: NameRef::new(skeleton_class),
            parent_import_id: -1,
            name: NameRef::new(skeleton_class),
            ..Default::default()
        },
    ];

    let exports = vec![ExportRecord {
        class_id: 1,
        import_id: -2,
        name: NameRef::new(asset_name),
        flags: 9,
        ignore: false,
        ..Default::default()
    }];

    let array = BoneArray { bones: vec![bone(root, -1), bone(spine, 0)] };
    let skeleton = SkeletonAsset {
        // opaque property bytes; the bone array is located through the
        // root bone's parent sentinel
        head: b"propertyblock\x00\x00\x00".to_vec(),
        array,
    };

    Uasset {
        header: PackageHeader::template(6),
        names,
        imports,
        exports,
        file_data_ids: vec![],
        version: VersionInfo::parse("4.18").unwrap(),
        asset_type: "Skeleton".to_string(),
        asset_name: "SK_Test_Skeleton".to_string(),
        asset_path: "/Game/Test/SK_Test_Skeleton".to_string(),
        size: 0,
        payload: Some(Uexp::new(AssetPayload::Skeleton(skeleton))),
        source_path: dir.join("SK_Test_Skeleton.uasset"),
    }
}

#[test]
fn skeleton_bundle_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let first = dir.path().join("SK_Test_Skeleton.uasset");
    let second = dir.path().join("again/SK_Test_Skeleton.uasset");

    let mut asset = synthetic_skeleton_asset(dir.path());
    let written = asset.save(&first)?;
    assert!(written > 0);

    let mut loaded = Uasset::open(&first, "4.18")?;
    assert_eq!(loaded.asset_type, "Skeleton");
    assert_eq!(loaded.asset_name, "SK_Test_Skeleton");
    assert_eq!(loaded.asset_path, "/Game/Test/SK_Test_Skeleton");
    assert_eq!(loaded.size, loaded.header.uasset_size as u64);

    // export offsets: container size plus the sizes of preceding exports
    let mut expected = loaded.header.uasset_size as u64;
    for exp in &loaded.exports {
        assert_eq!(exp.offset as u64, expected);
        expected += exp.size;
    }

    let uexp = loaded.payload.as_ref().unwrap();
    assert_eq!(uexp.author(), "");
    let skeleton = match &uexp.payload {
        AssetPayload::Skeleton(s) => s,
        other => panic!("wrong payload: {other:?}"),
    };
    assert_eq!(skeleton.array.bones.len(), 2);
    assert_eq!(skeleton.array.bones[0].name, "Root");
    assert_eq!(skeleton.array.bones[1].name, "Spine");
    assert_eq!(skeleton.array.bones[1].parent_name, "Root");
    assert_eq!(skeleton.array.bones[0].children, vec![1]);
    assert_eq!(skeleton.head, b"propertyblock\x00\x00\x00".to_vec());

    // unmodified re-save must be byte identical
    loaded.save(&second)?;
    for ext in ["uasset", "uexp"] {
        let a = std::fs::read(first.with_extension(ext))?;
        let b = std::fs::read(second.with_extension(ext))?;
        assert_eq!(a, b, "{ext} differs after round trip");
    }
    Ok(())
}

#[test]
fn skeleton_bone_injection_survives_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("SK_Test_Skeleton.uasset");
    let mut asset = synthetic_skeleton_asset(dir.path());
    asset.save(&path)?;

    let mut loaded = Uasset::open(&path, "4.18")?;
    let incoming = vec![
        uasset::primitives::BonePrimitive {
            name: "Root".to_string(),
            parent: None,
            rotation: DQuat::IDENTITY,
            position: DVec3::new(1.0, 2.0, 3.0),
            scale: DVec3::ONE,
        },
        uasset::primitives::BonePrimitive {
            name: "Tail".to_string(),
            parent: Some("Root".to_string()),
            rotation: DQuat::IDENTITY,
            position: DVec3::ZERO,
            scale: DVec3::ONE,
        },
    ];
    {
        let Uasset { names, payload, .. } = &mut loaded;
        let uexp = payload.as_mut().unwrap();
        match &mut uexp.payload {
            AssetPayload::Skeleton(skeleton) => skeleton.import_bones(&incoming, names),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    let out = dir.path().join("out/SK_Test_Skeleton.uasset");
    loaded.save(&out)?;
    let reloaded = Uasset::open(&out, "4.18")?;
    let skeleton = match &reloaded.payload.as_ref().unwrap().payload {
        AssetPayload::Skeleton(s) => s.clone(),
        other => panic!("wrong payload: {other:?}"),
    };
    assert_eq!(skeleton.array.bones.len(), 3);
    assert_eq!(skeleton.array.bones[0].position, DVec3::new(1.0, 2.0, 3.0));
    let tail = &skeleton.array.bones[2];
    assert_eq!(tail.name, "Tail");
    assert_eq!(tail.parent, 0);
    assert!(reloaded.names.find("Tail").is_some());
    Ok(())
}

/// Build a complete two-section skeletal mesh bundle in memory.
fn synthetic_skeletal_mesh_asset(dir: &std::path::Path) -> Uasset {
    use smallvec::SmallVec;
    use uasset::mesh::lod::{SkeletalLod, SkeletalLod4};
    use uasset::mesh::material::Material;
    use uasset::skeleton::BoneArray;
    use uasset::util::OpaqueBlob;

    let mut names = NameTable::default();
    let script = names.intern("/Script/Engine");
    let package = names.intern("Package");
    let mesh_class = names.intern("SkeletalMesh");
    let material_class = names.intern("MaterialInstanceConstant");
    let asset_name = names.intern("SK_Body");
    names.intern("/Game/Test/SK_Body");
    names.intern("None");
    let root = names.intern("Root");
    let mat_dir = names.intern("/Game/Test/Materials");
    let slot_body = names.intern("slot_Body");
    let slot_face = names.intern("slot_Face");
    let mi_body = names.intern("MI_Body");
    let mi_face = names.intern("MI_Face");

    let mut imports = Vec::new();
    // per material: a package import followed by the material import
    for name in [mi_body, mi_face] {
        let dir_index = imports.len() as i32 + 1;
        imports.push(ImportRecord {
            class_package: NameRef::new(script),
            class: NameRef::new(package),
            parent_import_id: 0,
            name: NameRef::new(mat_dir),
            ..Default::default()
        });
        imports.push(ImportRecord {
            class_package: NameRef::new(script),
            class: NameRef::new(material_class),
            parent_import_id: -dir_index,
            name: NameRef::new(name),
            ..Default::default()
        });
    }
    imports.push(ImportRecord {
        class_package: NameRef::new(script),
        class: NameRef::new(mesh_class),
        parent_import_id: 0,
        name: NameRef::new(mesh_class),
        ..Default::default()
    });

    let exports = vec![ExportRecord {
        class_id: 2,
        import_id: -(imports.len() as i32),
        name: NameRef::new(asset_name),
        flags: 9,
        ignore: false,
        ..Default::default()
    }];

    let materials = vec![
        Material {
            import_id: -2,
            slot_name_id: slot_body,
            unknown: vec![0; 28],
            slot_name: "slot_Body".to_string(),
            asset_name: "MI_Body".to_string(),
            ..Default::default()
        },
        Material {
            import_id: -4,
            slot_name_id: slot_face,
            unknown: vec![0; 28],
            slot_name: "slot_Face".to_string(),
            asset_name: "MI_Face".to_string(),
            ..Default::default()
        },
    ];

    let mut skeleton = uasset::skeleton::Skeleton { array: BoneArray::default() };
    skeleton.array.bones.push(bone(root, -1));

    let total = 6;
    let prims = MeshPrimitives {
        material_ids: vec![0, 1],
        positions: (0..total).map(|i| glam::Vec3::splat(i as f32)).collect(),
        normals: vec![[128, 128, 128, 255, 128, 128, 128, 0]; total],
        uv_maps: vec![vec![[0.25, 0.5]; total]],
        vertex_counts: vec![3, 3],
        indices: vec![vec![0, 1, 2], vec![0, 1, 2]],
        vertex_groups: vec![vec![0], vec![0]],
        joints: vec![SmallVec::from_slice(&[0]); total],
        weights: vec![SmallVec::from_slice(&[255]); total],
        ..Default::default()
    };
    let mut lod = SkeletalLod4 {
        sections: vec![Default::default()],
        ib: Default::default(),
        active_bone_ids: vec![0],
        required_bone_ids: vec![0],
        vertex_map: Vec::new(),
        max_vertex_map_id: 0,
        uv_count: 1,
        vertex_vb: Default::default(),
        weight_vb: Default::default(),
        color_vb: None,
        tessellation_ib: None,
        kdi_buffer: None,
        kdi_vb: None,
    };
    lod.import(&prims);

    let version = VersionInfo::parse("4.18").unwrap();
    let mesh = uasset::mesh::SkeletalMesh::assemble(
        &version,
        b"headdata".to_vec(),
        materials,
        skeleton,
        vec![SkeletalLod::V4(lod)],
        None,
    );

    let mut uexp = Uexp::new(AssetPayload::SkeletalMesh(mesh));
    // real payloads always carry bytes after the LOD array; the reader
    // probes into them for the optional color block
    uexp.trailer = OpaqueBlob::new(0, vec![0; 4]);

    Uasset {
        header: PackageHeader::template(6),
        names,
        imports,
        exports,
        file_data_ids: vec![-2, -4],
        version,
        asset_type: "SkeletalMesh".to_string(),
        asset_name: "SK_Body".to_string(),
        asset_path: "/Game/Test/SK_Body".to_string(),
        size: 0,
        payload: Some(uexp),
        source_path: dir.join("SK_Body.uasset"),
    }
}

#[test]
fn skeletal_mesh_bundle_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let first = dir.path().join("SK_Body.uasset");
    let second = dir.path().join("again/SK_Body.uasset");

    let mut asset = synthetic_skeletal_mesh_asset(dir.path());
    asset.save(&first)?;

    let mut loaded = Uasset::open(&first, "4.18")?;
    assert_eq!(loaded.asset_type, "SkeletalMesh");
    let mesh = loaded.payload.as_ref().unwrap().skeletal_mesh().unwrap();
    assert_eq!(mesh.materials.len(), 2);
    assert_eq!(mesh.materials[0].slot_name, "slot_Body");
    assert_eq!(mesh.materials[1].asset_name, "MI_Face");
    assert_eq!(mesh.skeleton.bones().len(), 1);
    assert!(!mesh.lods.is_empty());
    assert_eq!(mesh.head, b"headdata".to_vec());

    let prims = mesh.parse_primitives()?;
    assert_eq!(prims.material_ids, vec![0, 1]);
    assert_eq!(prims.positions.len(), 6);
    assert_eq!(prims.vertex_counts, vec![3, 3]);
    assert_eq!(prims.indices, vec![vec![0, 1, 2], vec![0, 1, 2]]);
    assert_eq!(prims.materials.len(), 2);

    // save, reload: identical section layout and material ids
    loaded.save(&second)?;
    let reloaded = Uasset::open(&second, "4.18")?;
    let mesh2 = reloaded.payload.as_ref().unwrap().skeletal_mesh().unwrap();
    let prims2 = mesh2.parse_primitives()?;
    assert_eq!(prims2.material_ids, prims.material_ids);
    assert_eq!(prims2.vertex_counts, prims.vertex_counts);

    for ext in ["uasset", "uexp"] {
        let a = std::fs::read(first.with_extension(ext))?;
        let b = std::fs::read(second.with_extension(ext))?;
        assert_eq!(a, b, "{ext} differs after round trip");
    }
    Ok(())
}

#[test]
fn author_string_embeds_and_survives() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("SK_Test_Skeleton.uasset");
    let mut asset = synthetic_skeleton_asset(dir.path());
    asset.embed_author("modder")?;
    asset.save(&path)?;

    let loaded = Uasset::open(&path, "4.18")?;
    assert_eq!(loaded.payload.as_ref().unwrap().author(), "modder");
    Ok(())
}

#[test]
fn missing_payload_file_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("SK_Test_Skeleton.uasset");
    let mut asset = synthetic_skeleton_asset(dir.path());
    asset.save(&path)?;
    std::fs::remove_file(path.with_extension("uexp"))?;

    let err = Uasset::open(&path, "4.18").unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    Ok(())
}
